//! Property-based testing for fileinfo
//!
//! Uses proptest to check the invariants the manifest format relies on:
//! names survive escaping, the reorder buffer hides arrival order, and the
//! delta encoder writes nothing for a field that did not change.

use ::fileinfo::encoder::encode;
use ::fileinfo::escape::{escape_filename, is_printable, unescape_filename};
use ::fileinfo::serializer::{ManifestWriter, Serializer};
use ::fileinfo::timestamp::format_file_time;
use ::fileinfo::*;
use chrono::NaiveDateTime;
use proptest::prelude::*;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

/// Timestamps between 1970 and 2100
fn file_time_strategy() -> impl Strategy<Value = FileTime> {
    (0i64..4_102_444_800, prop_oneof![Just(0u32), 0u32..1_000_000_000])
        .prop_map(|(secs, nanos)| FileTime::precise(secs, nanos))
}

/// Stat of a regular file whose mtime equals its ctime
fn stat_strategy() -> impl Strategy<Value = FileStat> {
    (
        0u32..0o7777,
        1u64..10_000_000,
        1u64..8,
        0u32..70_000,
        0u32..70_000,
        0u64..1 << 40,
        file_time_strategy(),
        file_time_strategy(),
    )
        .prop_map(|(perms, ino, nlink, uid, gid, size, ctime, atime)| FileStat {
            mode: 0o100000 | perms,
            ino,
            nlink,
            uid,
            gid,
            size,
            ctime,
            mtime: ctime,
            atime,
            ..Default::default()
        })
}

/// Names as they come out of directory listings
fn name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9_.-]{1,20}",
        "[a-z ]{1,5}[\\t\\n\\\\]{1,3}[a-z]{0,5}",
        "\\PC{1,12}",
        any::<String>().prop_filter("non-empty", |s| !s.is_empty()),
    ]
}

fn record_item(name: &str, stat: FileStat, hash: Option<String>) -> ManifestItem {
    let mut record = FileRecord::new(OsString::from(name), PathBuf::from(name), stat);
    record.hash = hash;
    ManifestItem::File(record)
}

fn items_strategy() -> impl Strategy<Value = Vec<ManifestItem>> {
    prop::collection::vec((name_strategy(), stat_strategy(), any::<bool>()), 1..40).prop_map(
        |entries| {
            let mut items = vec![ManifestItem::Directory(DirectoryMarker {
                path: PathBuf::from("/data"),
                fs_class: FsClass::Unix,
            })];
            for (i, (name, stat, cached)) in entries.into_iter().enumerate() {
                if cached {
                    items.push(ManifestItem::Cached(CachedReference { name: name.into(), stat }));
                } else {
                    let hash = (i % 3 != 0).then(|| checksum::hash_data(name.as_bytes()));
                    items.push(record_item(&name, stat, hash));
                }
            }
            items
        },
    )
}

fn write_all(items: impl IntoIterator<Item = Sequenced<ManifestItem>>) -> String {
    let mut out = Vec::new();
    {
        let mut writer = ManifestWriter::new(&mut out, io::sink());
        writer.write_header(true).unwrap();
        let mut serializer = Serializer::new(writer);
        for item in items {
            serializer.accept(item).unwrap();
        }
        assert_eq!(serializer.pending(), 0);
        serializer.finish().unwrap();
    }
    String::from_utf8(out).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Escaping then unescaping gives back the original name
    #[test]
    fn escape_round_trip(name in any::<String>()) {
        let escaped = escape_filename(&name);
        prop_assert_eq!(unescape_filename(&escaped).unwrap(), OsString::from(name));
    }

    /// Escaped names fit on one manifest line and show only printable text
    #[test]
    fn escaped_names_are_printable(name in any::<String>()) {
        let escaped = escape_filename(&name);
        prop_assert!(escaped.chars().all(is_printable), "{:?}", escaped);
        prop_assert!(!escaped.contains('\n'));
    }

    /// Names made of plain printable characters are written as they are
    #[test]
    fn plain_names_unchanged(name in "[a-zA-Z0-9_.,+=-]{1,40}") {
        prop_assert_eq!(escape_filename(&name), name);
    }

    /// Timestamps parse back to the same second, without trailing zeros
    #[test]
    fn timestamp_shape(time in file_time_strategy()) {
        let text = format_file_time(&time);
        let FileTime::Precise { secs, nanos } = time else { unreachable!() };

        let (whole, fraction) = match text.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (text.as_str(), None),
        };
        let parsed = NaiveDateTime::parse_from_str(whole, "%Y%m%d%H%M%S").unwrap();
        prop_assert_eq!(parsed.and_utc().timestamp(), secs);

        match fraction {
            None => prop_assert_eq!(nanos, 0),
            Some(fraction) => {
                prop_assert!(!fraction.ends_with('0'));
                prop_assert!(fraction.len() <= 9);
                let padded = format!("{:0<9}", fraction);
                prop_assert_eq!(padded.parse::<u32>().unwrap(), nanos);
            }
        }
    }

    /// A record equal to its baseline only writes its name
    #[test]
    fn unchanged_record_writes_only_name(name in name_strategy(), stat in stat_strategy()) {
        let encoded = encode(record_item(&name, stat, None), Some(stat));
        prop_assert_eq!(encoded.text, format!(">{}\n", escape_filename(&name)));
        prop_assert_eq!(encoded.baseline, Some(stat));
        prop_assert!(encoded.diagnostic.is_none());
    }

    /// Without a baseline every field after the mode is present, M excepted
    #[test]
    fn first_record_is_complete(name in name_strategy(), stat in stat_strategy()) {
        let encoded = encode(record_item(&name, stat, None), None);
        let markers: String = encoded.text.lines().filter_map(|l| l.chars().next()).collect();
        prop_assert_eq!(markers, "minugsCA>");
    }

    /// The mtime line only appears when mtime and ctime format differently
    #[test]
    fn mtime_line_tracks_ctime(
        stat in stat_strategy(),
        mtime in file_time_strategy(),
    ) {
        let stat = FileStat { mtime, ..stat };
        let encoded = encode(record_item("f", stat, None), Some(stat));
        let has_mtime = encoded.text.lines().any(|l| l.starts_with('M'));
        prop_assert_eq!(has_mtime, format_file_time(&mtime) != format_file_time(&stat.ctime));
    }

    /// Output does not depend on the order items reach the serializer
    #[test]
    fn serializer_hides_arrival_order(
        (items, order) in items_strategy().prop_flat_map(|items| {
            let order = Just((0..items.len()).collect::<Vec<_>>()).prop_shuffle();
            (Just(items), order)
        })
    ) {
        let in_order = write_all(
            items.iter().cloned().enumerate().map(|(i, item)| Sequenced::new(i as u64, item)),
        );
        let shuffled = write_all(
            order.iter().map(|&i| Sequenced::new(i as u64, items[i].clone())),
        );
        prop_assert_eq!(shuffled, in_order);
    }

    /// The reader sees every item the writer wrote, names intact
    #[test]
    fn reader_accepts_writer_output(items in items_strategy()) {
        let manifest = write_all(
            items.iter().cloned().enumerate().map(|(i, item)| Sequenced::new(i as u64, item)),
        );
        let entries: Vec<ManifestEntry> = ManifestReader::new(manifest.as_bytes())
            .unwrap()
            .map(|e| e.unwrap())
            .collect();
        prop_assert_eq!(entries.len(), items.len());

        for (entry, item) in entries.iter().zip(&items) {
            match (entry, item) {
                (ManifestEntry::Directory { path, .. }, ManifestItem::Directory(marker)) => {
                    prop_assert_eq!(path, &marker.path);
                }
                (ManifestEntry::CachedReference(raw), ManifestItem::Cached(cached)) => {
                    prop_assert_eq!(&raw.name, &cached.name);
                    let ino = cached.stat.ino.to_string();
                    prop_assert_eq!(raw.field(FieldTag::Inode), Some(ino.as_str()));
                }
                (ManifestEntry::Record(raw), ManifestItem::File(record)) => {
                    prop_assert_eq!(&raw.name, &record.name);
                    prop_assert_eq!(raw.field(FieldTag::Hash), record.hash.as_deref());
                }
                (entry, item) => prop_assert!(false, "{:?} read back as {:?}", item, entry),
            }
        }
    }
}

#[cfg(unix)]
proptest! {
    /// Undecodable bytes in names survive the round trip on Unix
    #[test]
    fn raw_byte_names_round_trip(bytes in prop::collection::vec(1u8..=255, 1..30)) {
        use ::fileinfo::escape::escape_os_str;
        use std::os::unix::ffi::OsStringExt;

        let bytes: Vec<u8> = bytes.into_iter().filter(|&b| b != b'/').collect();
        prop_assume!(!bytes.is_empty());
        let name = OsString::from_vec(bytes);
        let escaped = escape_os_str(&name);
        prop_assert!(escaped.chars().all(is_printable));
        prop_assert_eq!(unescape_filename(&escaped).unwrap(), name);
    }
}
