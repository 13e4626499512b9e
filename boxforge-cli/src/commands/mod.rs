pub mod build;
pub mod buildimages;
pub mod interactive;
