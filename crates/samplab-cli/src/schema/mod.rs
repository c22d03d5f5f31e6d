pub mod star_catalog;
