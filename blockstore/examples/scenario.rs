use blockstore::{BlockStore, Layout};

pub fn main() {
    let mut store = BlockStore::<8, 4>::create().expect("Could not allocate block store.");

    let ids: Vec<_> = (0..3).map(|_| store.allocate().unwrap()).collect();
    println!("allocated {:?}", ids);

    store.release(1);
    println!("released 1, next allocation is {}", store.allocate().unwrap());

    store.write(2, &[1, 2, 3, 4]).unwrap();
    let mut buf = [0; 4];
    store.read(2, &mut buf).unwrap();
    println!("block 2 holds {:?}", buf);

    // Blocks 0 and 1 are allocated but never written. The default headerless
    // layout would reload them as free, so keep the bitmap in the image.
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let written = store.serialize_with(tmp.path(), Layout::Snapshot).unwrap();
    let loaded = BlockStore::<8, 4>::deserialize_with(tmp.path(), Layout::Snapshot).unwrap();
    println!(
        "wrote {} bytes, reloaded store has {} of {} blocks in use (was {})",
        written,
        loaded.used_count(),
        BlockStore::<8, 4>::total_count(),
        store.used_count()
    );
}
