//! Build VM: the isolated host in which containers are provisioned.

pub mod vagrantfile;
mod vm;

pub use vm::BuildVm;
