mod common;

mod dependencies;
mod gpu;
mod null_as;
