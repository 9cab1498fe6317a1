pub mod use_virtual_list;

pub use use_virtual_list::{use_virtual_list, ListHandle, UseVirtualList};
