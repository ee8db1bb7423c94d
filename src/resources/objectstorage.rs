//! Resources of the objectstorage.mystorage.sh group
pub mod bucket;
