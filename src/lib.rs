pub mod asset {
    pub use ember_asset::*;
}
