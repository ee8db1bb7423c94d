pub mod objectstorage;
