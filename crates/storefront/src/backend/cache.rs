//! Cache value wrapper for catalog reads.

use super::types::{Offer, Product, SiteSetting};

/// Values stored in the catalog cache.
///
/// A single moka cache holds every cached read; the enum keeps the value
/// type uniform while each getter only accepts its own variant.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Products(Vec<Product>),
    Product(Box<Product>),
    Offers(Vec<Offer>),
    Settings(Vec<SiteSetting>),
}
