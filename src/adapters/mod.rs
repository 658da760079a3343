pub mod marketplace;
pub mod sheets;
pub mod wms;
