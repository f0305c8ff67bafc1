pub mod client;
pub mod types;

pub use client::CardDavClient;
pub use types::{AddressBook, CardDavAccount, FetchVCardsOptions, VCard};
