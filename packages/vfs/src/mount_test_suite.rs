//! Behaviour shared by every mount backend.
//!
//! Read-only checks take a skeleton mount holding `dir/file.lua` (containing
//! `print('testing')`, modified at [`modify_time`] where supported) and an
//! empty `f.lua`. Writable checks take a factory producing an empty mount of
//! a given capacity.

use std::io::{Read, Seek, Write};
use std::time::{Duration, SystemTime};

use crate::error::FileErrorKind;
use crate::mount::{Mount, OpenOptions, WritableMount, MINIMUM_FILE_SIZE};

pub const CAPACITY: u64 = 1_000_000;

pub const FILE_CONTENTS: &str = "print('testing')";

pub fn long_contents() -> String {
    "This is some example text.\n".repeat(100)
}

pub fn modify_time() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(2 * 24 * 60 * 60)
}

/// A writable mount under test, plus backend-specific inspection.
pub trait MountAccess {
    type Mount: WritableMount;

    fn mount(&self) -> &Self::Mount;

    fn make_read_only(&self, path: &str);

    /// Make sure the backing storage exists, for backends which create it
    /// lazily.
    fn ensure_exists(&self);

    /// Remaining space recomputed from the backing storage rather than the
    /// mount's own bookkeeping.
    fn compute_remaining_space(&self) -> u64;
}

pub fn write_file(mount: &impl WritableMount, path: &str, contents: &str) {
    let mut handle = mount.open_for_write(path).unwrap();
    handle.write_all(contents.as_bytes()).unwrap();
    handle.flush().unwrap();
}

fn assert_consistent(access: &impl MountAccess) {
    assert_eq!(
        access.compute_remaining_space(),
        access.mount().remaining_space().unwrap(),
        "Free space is inconsistent"
    );
}

fn existing<A: MountAccess>(create: fn(u64) -> A) -> A {
    let access = create(CAPACITY);
    access.ensure_exists();
    access
}

pub fn is_directory_works(mount: &impl Mount) {
    assert!(mount.is_directory("").unwrap(), "Root should be directory");
    assert!(mount.is_directory("dir").unwrap(), "dir should be directory");
    assert!(!mount.is_directory("dir/file.lua").unwrap());
    assert!(!mount.is_directory("doesnt/exist").unwrap());
}

pub fn exists_works(mount: &impl Mount) {
    assert!(mount.exists("").unwrap(), "Root should exist");
    assert!(mount.exists("dir").unwrap(), "dir should exist");
    assert!(!mount.exists("doesnt/exist").unwrap());
}

pub fn list_works(mount: &impl Mount) {
    let mut list = mount.list("").unwrap();
    list.sort();
    assert_eq!(list, vec!["dir", "f.lua"]);
}

pub fn list_missing_fails(mount: &impl Mount) {
    let error = mount.list("no_such_file").unwrap_err();
    assert_eq!(error.path(), Some("no_such_file"));
    assert_eq!(error.kind(), Some(FileErrorKind::NoSuchFile));
}

pub fn list_file_fails(mount: &impl Mount) {
    let error = mount.list("dir/file.lua").unwrap_err();
    assert_eq!(error.path(), Some("dir/file.lua"));
    assert_eq!(error.kind(), Some(FileErrorKind::NotADirectory));
}

pub fn open_file_works(mount: &impl Mount) {
    let mut contents = String::new();
    mount
        .open_for_read("dir/file.lua")
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    assert_eq!(contents, FILE_CONTENTS);
}

pub fn open_for_read_fails_on_missing_file(mount: &impl Mount) {
    let error = mount.open_for_read("doesnt/exist").err().unwrap();
    assert_eq!(error.path(), Some("doesnt/exist"));
    assert_eq!(error.message(), "No such file");
}

pub fn open_for_read_fails_on_directory(mount: &impl Mount) {
    let error = mount.open_for_read("dir").err().unwrap();
    assert_eq!(error.path(), Some("dir"));
    assert_eq!(error.kind(), Some(FileErrorKind::NotAFile));
}

pub fn size_works(mount: &impl Mount) {
    assert_eq!(mount.size("f.lua").unwrap(), 0, "Empty file has 0 size");
    assert_eq!(mount.size("dir/file.lua").unwrap(), FILE_CONTENTS.len() as u64);
    assert_eq!(mount.size("dir").unwrap(), 0, "Directory has 0 size");
}

pub fn file_attributes_work(mount: &impl Mount, has_file_times: bool) {
    let attributes = mount.attributes("dir/file.lua").unwrap();
    assert!(!attributes.is_directory);
    assert_eq!(attributes.size, FILE_CONTENTS.len() as u64);
    let expected = if has_file_times {
        modify_time()
    } else {
        SystemTime::UNIX_EPOCH
    };
    assert_eq!(attributes.modified, expected);
}

pub fn directory_attributes_work(mount: &impl Mount) {
    assert!(mount.attributes("").unwrap().is_directory);
}

/// Every read-only check against one skeleton factory.
pub fn run_mount_suite<M: Mount>(skeleton: impl Fn() -> M, has_file_times: bool) {
    is_directory_works(&skeleton());
    exists_works(&skeleton());
    list_works(&skeleton());
    list_missing_fails(&skeleton());
    list_file_fails(&skeleton());
    open_file_works(&skeleton());
    open_for_read_fails_on_missing_file(&skeleton());
    open_for_read_fails_on_directory(&skeleton());
    size_works(&skeleton());
    file_attributes_work(&skeleton(), has_file_times);
    directory_attributes_work(&skeleton());
}

pub fn root_is_writable<A: MountAccess>(create: fn(u64) -> A) {
    assert!(!existing(create).mount().is_read_only("").unwrap());
    assert!(!create(CAPACITY).mount().is_read_only("").unwrap());
}

pub fn missing_dir_is_writable<A: MountAccess>(create: fn(u64) -> A) {
    assert!(!existing(create).mount().is_read_only("foo/bar/baz/qux").unwrap());
}

pub fn make_directory_recursive<A: MountAccess>(create: fn(u64) -> A) {
    let access = create(CAPACITY);
    let mount = access.mount();
    mount.make_directory("a/b/c").unwrap();

    assert!(mount.is_directory("a/b/c").unwrap());
    assert_eq!(
        mount.remaining_space().unwrap(),
        CAPACITY - MINIMUM_FILE_SIZE * 3
    );
    assert_consistent(&access);
}

pub fn can_make_read_only<A: MountAccess>(create: fn(u64) -> A) {
    let access = create(CAPACITY);
    let mount = access.mount();
    mount.make_directory("read-only").unwrap();

    assert!(!mount.is_read_only("read-only").unwrap());
    access.make_read_only("read-only");
    assert!(mount.is_read_only("read-only").unwrap());
    assert!(mount.is_read_only("read-only/child").unwrap(), "Child should be read-only");
    let error = mount.open_for_write("read-only/child").err().unwrap();
    assert_eq!(error.kind(), Some(FileErrorKind::AccessDenied));
}

pub fn initial_free_space_and_capacity<A: MountAccess>(create: fn(u64) -> A) {
    let access = existing(create);
    assert_eq!(access.mount().capacity(), CAPACITY);
    assert_eq!(access.mount().remaining_space().unwrap(), CAPACITY);
}

pub fn write_updates_size_and_free_space<A: MountAccess>(create: fn(u64) -> A) {
    let access = existing(create);
    let mount = access.mount();
    let long = long_contents();

    write_file(mount, "hello.txt", &long);
    assert_eq!(mount.size("hello.txt").unwrap(), long.len() as u64);
    assert_eq!(mount.remaining_space().unwrap(), CAPACITY - long.len() as u64);

    write_file(mount, "hello.txt", "");
    assert_eq!(mount.size("hello.txt").unwrap(), 0);
    assert_eq!(mount.remaining_space().unwrap(), CAPACITY - MINIMUM_FILE_SIZE);
    assert_consistent(&access);
}

pub fn writing_uses_latest_file_size<A: MountAccess>(create: fn(u64) -> A) {
    let access = existing(create);
    let mount = access.mount();
    let long = long_contents();

    let mut handle = mount.open_file("file.txt", OpenOptions::WRITE).unwrap();
    handle.write_all(long.as_bytes()).unwrap();
    handle.flush().unwrap();
    assert_eq!(mount.remaining_space().unwrap(), CAPACITY - long.len() as u64);
    assert_consistent(&access);

    let handle2 = mount.open_file("file.txt", OpenOptions::WRITE).unwrap();

    handle.write_all(b"test").unwrap();
    handle.flush().unwrap();
    assert_eq!(
        mount.remaining_space().unwrap(),
        CAPACITY - long.len() as u64 - 4
    );
    assert_consistent(&access);

    drop(handle2);
    drop(handle);

    mount.delete("file.txt").unwrap();
    assert_eq!(mount.remaining_space().unwrap(), CAPACITY);
    assert_consistent(&access);
}

pub fn append_jumps_to_file_end<A: MountAccess>(create: fn(u64) -> A) {
    let access = existing(create);
    let mount = access.mount();
    write_file(mount, "a.txt", "example");

    {
        let mut handle = mount.open_file("a.txt", OpenOptions::APPEND).unwrap();
        assert_eq!(handle.stream_position().unwrap(), 7);
        handle.write_all(b" text").unwrap();
        assert_eq!(handle.stream_position().unwrap(), 12);
    }

    assert_eq!(mount.size("a.txt").unwrap(), 12);
}

pub fn move_file<A: MountAccess>(create: fn(u64) -> A) {
    for contents in [String::new(), long_contents()] {
        let access = existing(create);
        let mount = access.mount();
        write_file(mount, "src.txt", &contents);
        let remaining = mount.remaining_space().unwrap();

        mount.rename("src.txt", "dest.txt").unwrap();
        assert!(!mount.exists("src.txt").unwrap());
        assert!(mount.exists("dest.txt").unwrap());
        assert_eq!(mount.size("dest.txt").unwrap(), contents.len() as u64);
        assert_eq!(
            mount.remaining_space().unwrap(),
            remaining,
            "Free space has changed after moving"
        );
        assert_consistent(&access);
    }
}

pub fn move_file_fails_when_destination_exists<A: MountAccess>(create: fn(u64) -> A) {
    for contents in [String::new(), long_contents()] {
        let access = existing(create);
        let mount = access.mount();
        write_file(mount, "src.txt", &contents);
        write_file(mount, "dest.txt", "dest");
        let remaining = mount.remaining_space().unwrap();

        assert!(mount.rename("src.txt", "dest.txt").is_err());
        assert_eq!(mount.size("src.txt").unwrap(), contents.len() as u64);
        assert_eq!(mount.size("dest.txt").unwrap(), 4);
        assert_eq!(mount.remaining_space().unwrap(), remaining);
        assert_consistent(&access);
    }
}

pub fn move_file_fails_when_source_does_not_exist<A: MountAccess>(create: fn(u64) -> A) {
    let access = existing(create);
    let mount = access.mount();
    write_file(mount, "dest.txt", "dest");
    let remaining = mount.remaining_space().unwrap();

    assert!(mount.rename("src.txt", "dest.txt").is_err());
    assert!(!mount.exists("src.txt").unwrap());
    assert_eq!(mount.size("dest.txt").unwrap(), 4);
    assert_eq!(mount.remaining_space().unwrap(), remaining);
    assert_consistent(&access);
}

/// Every writable check against one factory.
pub fn run_writable_suite<A: MountAccess>(create: fn(u64) -> A) {
    root_is_writable(create);
    missing_dir_is_writable(create);
    make_directory_recursive(create);
    can_make_read_only(create);
    initial_free_space_and_capacity(create);
    write_updates_size_and_free_space(create);
    writing_uses_latest_file_size(create);
    append_jumps_to_file_end(create);
    move_file(create);
    move_file_fails_when_destination_exists(create);
    move_file_fails_when_source_does_not_exist(create);
}
