//! Client-side catalog controller: paginated loading and prefix search of a
//! remote product collection, published as a single observable state.

mod controller;
pub mod error;
pub mod options;
pub mod state;
pub mod store;

pub use controller::{FetchCommand, FetchController};
pub use error::{FetchError, StoreError};
pub use options::{BatchPolicy, CommitPolicy, ControllerOptions};
pub use state::{FetchState, StateStream};
pub use store::{MissingProductStore, Page, PageQuery, PrefixRange, ProductStore};
