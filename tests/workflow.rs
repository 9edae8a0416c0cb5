mod disk_commons;

use disk_commons::*;

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use imgchain::{workflow, Access, BootTarget, Catalog, Error, HeaderError};

use tempfile::{NamedTempFile, TempDir};
use test_log::test;

/// A directory with a few boot-sector-only images and an image list naming them
fn image_dir(images: &[(u32, &str, [u8; 512])]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let mut list = String::from("# generated by the tests\n");

    for (size_gib, name, mbr) in images {
        let path = dir.path().join(name);
        fs::write(&path, mbr).unwrap();
        list.push_str(&format!("{size_gib} {}\n", path.display()));
    }

    let list_path = dir.path().join("images.list");
    fs::write(&list_path, list).unwrap();

    (dir, list_path)
}

/// A sparse device file with room for `gib` GiB of images
fn device_file(gib: u64) -> NamedTempFile {
    let device = NamedTempFile::new().unwrap();
    SparseDisk::with_room_for(gib)
        .dump_to(&mut device.reopen().unwrap())
        .unwrap();

    device
}

/// A device file holding a freshly built chain of 1 GiB images, booting the first one
fn built_device(names: &[&str]) -> NamedTempFile {
    let text: String = names.iter().map(|name| format!("1 /images/{name}\n")).collect();
    let mut manifest = manifest(&text, |_| small_image_mbr(b'x')).unwrap();

    let disk = SparseDisk::with_room_for(names.len() as u64);
    let mut catalog = Catalog::from_storage(disk, "sparse", Access::ReadWrite).unwrap();
    workflow::build_catalog(&mut catalog, &mut manifest, 1, |_| ()).unwrap();

    let device = NamedTempFile::new().unwrap();
    catalog
        .into_storage()
        .dump_to(&mut device.reopen().unwrap())
        .unwrap();

    device
}

fn header_region(path: &Path) -> Vec<u8> {
    let mut bytes = vec![0; imgchain::disk::HEADER_SIZE];
    File::open(path).unwrap().read_exact(&mut bytes).unwrap();
    bytes
}

#[test]
fn list_reports_catalog() {
    let device = built_device(&["alpine.img", "debian.img"]);

    let listing = workflow::list(device.path()).unwrap();
    assert_eq!(listing.boot, BootTarget::Image(1));
    assert_eq!(
        listing.to_string(),
        "* 1: alpine.img\n  2: debian.img\n* - active partition 1"
    );
}

#[test]
fn switch_changes_listing() {
    let device = built_device(&["alpine.img", "debian.img", "fedora.img"]);

    workflow::switch(device.path(), 3).unwrap();

    let listing = workflow::list(device.path()).unwrap();
    assert_eq!(listing.boot, BootTarget::Image(3));
    assert!(listing.entries[2].active);
    assert!(!listing.entries[0].active);
}

#[test]
fn switch_out_of_range_leaves_device_alone() {
    let device = built_device(&["alpine.img", "debian.img"]);
    let before = header_region(device.path());

    let err = workflow::switch(device.path(), 3).unwrap_err();
    assert!(matches!(err, Error::OrdinalOutOfRange { ordinal: 3, count: 2 }));
    assert_eq!(header_region(device.path()), before);
}

#[test]
fn blank_device_has_no_catalog() {
    let device = device_file(1);

    let err = workflow::list(device.path()).unwrap_err();
    assert!(matches!(
        err,
        Error::Header {
            kind: HeaderError::MissingMarker,
            ..
        }
    ));
    assert_eq!(err.exit_code(), 17);

    let err = workflow::switch(device.path(), 1).unwrap_err();
    assert_eq!(err.exit_code(), 17);
}

#[test]
fn missing_device() {
    let dir = TempDir::new().unwrap();

    let err = workflow::list(dir.path().join("no-such-device")).unwrap_err();
    assert!(matches!(err, Error::DeviceOpen { .. }));
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn preview_build_leaves_device_file_alone() {
    let (_dir, list) = image_dir(&[
        (1, "alpine.img", small_image_mbr(b'a')),
        (1, "debian.img", small_image_mbr(b'd')),
    ]);
    let device = device_file(2);
    let len = fs::metadata(device.path()).unwrap().len();

    let mut started = Vec::new();
    workflow::build(device.path(), &list, 2, Access::Preview, |progress| {
        if let imgchain::Progress::Started { image, .. } = progress {
            started.push(image.to_owned());
        }
    })
    .unwrap();

    assert_eq!(started.len(), 2);
    assert!(started[1].ends_with("/debian.img"));
    assert_eq!(fs::metadata(device.path()).unwrap().len(), len);
    assert!(header_region(device.path()).iter().all(|b| *b == 0));
}

#[test]
fn preview_build_checks_capacity() {
    let (_dir, list) = image_dir(&[
        (1, "alpine.img", small_image_mbr(b'a')),
        (2, "debian.img", small_image_mbr(b'd')),
    ]);
    let device = device_file(2);

    let err = workflow::build(device.path(), &list, 1, Access::Preview, |_| ()).unwrap_err();
    assert!(matches!(
        err,
        Error::Capacity {
            available_gib: 2,
            required_gib: 3,
            ..
        }
    ));
}

#[test]
fn boot_ordinal_is_checked_before_opening_device() {
    let (dir, list) = image_dir(&[(1, "alpine.img", small_image_mbr(b'a'))]);

    let err = workflow::build(dir.path().join("no-such-device"), &list, 2, Access::ReadWrite, |_| ())
        .unwrap_err();
    assert!(matches!(err, Error::OrdinalOutOfRange { ordinal: 2, count: 1 }));
}

#[test]
fn missing_image_list() {
    let device = device_file(1);
    let dir = TempDir::new().unwrap();

    let err = workflow::build(device.path(), dir.path().join("nope.list"), 1, Access::Preview, |_| ())
        .unwrap_err();
    assert!(matches!(err, Error::ManifestOpen { .. }));
    assert_eq!(err.exit_code(), 8);
}

#[test]
fn missing_image_file() {
    let dir = TempDir::new().unwrap();
    let list = dir.path().join("images.list");
    fs::write(&list, format!("1 {}\n", dir.path().join("gone.img").display())).unwrap();
    let device = device_file(1);

    let err = workflow::build(device.path(), &list, 1, Access::Preview, |_| ()).unwrap_err();
    assert!(matches!(err, Error::SourceOpen { .. }));
    assert_eq!(err.exit_code(), 11);
}
