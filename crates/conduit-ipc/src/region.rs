//! mmap'd file open/create helper shared by the control and ring regions.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use memmap2::MmapMut;

/// Opens `path`, growing it to `size` bytes if it is smaller, and maps it.
/// Returns whether the file was empty before this call (i.e. this caller
/// is the one responsible for initializing the header).
pub(crate) fn open_or_create(path: &Path, size: usize) -> io::Result<(MmapMut, bool)> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;
    let existing_len = file.metadata()?.len();
    let fresh = existing_len == 0;
    if (existing_len as usize) < size {
        file.set_len(size as u64)?;
    }
    let mmap = unsafe { MmapMut::map_mut(&file)? };
    Ok((mmap, fresh))
}
