//! Virtual folders: the directories an extent list may spread across

pub mod folder;
pub mod virtual_folders;


pub use folder::{FolderAttribute, VirtualFolder};
pub use virtual_folders::{VirtualFolders, VIRTUAL_FOLDERS_FILE};
