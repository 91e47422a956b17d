pub mod local;
pub mod state;

pub use local::LocalStore;
pub use state::{Cart, CartItem, CartProduct, NetworkPreference, Wishlist};
