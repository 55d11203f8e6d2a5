//! # Table I/O Integration Tests
//!
//! End-to-end coverage over real files in a temp directory: typed
//! decoding of every scenario column, cursor navigation, deletion
//! detection, in-place writes, appends across a reopen, memo block
//! round-trips, and linear search.
//!
//! Fixtures are written through the crate's own layout structs, so a
//! layout regression shows up both here and in the unit tests.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use foxbase::storage::{
    ColumnDescriptor, MemoHeader, TableHeader, COLUMN_END, DELETED, FOXPRO, MEMO_FLAG,
};
use foxbase::{ColumnType, Config, Dbf, DbfError, UnicodeConverter, Value};
use tempfile::{tempdir, TempDir};
use zerocopy::IntoBytes;

const BLOCK_SIZE: u16 = 64;
const FPT_HEADER_AREA: u32 = 512;

type ColumnSpec = (&'static str, ColumnType, u8, u8);

/// Writes a table file (and optionally an empty FPT next to it) and
/// returns its path. Row buffers must already carry their deletion
/// marker byte.
fn write_table_full(
    dir: &Path,
    name: &str,
    file_type: u8,
    code_page: u8,
    columns: &[ColumnSpec],
    rows: &[Vec<u8>],
    with_memo: bool,
) -> PathBuf {
    let mut descriptors = Vec::new();
    let mut position = 1u32;
    for (column_name, column_type, length, decimals) in columns {
        descriptors.push(ColumnDescriptor::new(
            column_name,
            *column_type,
            position,
            *length,
            *decimals,
        ));
        position += u32::from(*length);
    }
    let row_length = position as u16;
    let first_row = (32 + 32 * columns.len() + 1) as u16;
    let flags = if with_memo { MEMO_FLAG } else { 0 };
    let header = TableHeader::new(
        file_type,
        rows.len() as u32,
        first_row,
        row_length,
        flags,
        code_page,
    );

    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    file.write_all(header.as_bytes()).unwrap();
    for descriptor in &descriptors {
        file.write_all(descriptor.as_bytes()).unwrap();
    }
    file.write_all(&[COLUMN_END]).unwrap();
    for row in rows {
        assert_eq!(row.len(), row_length as usize, "fixture row width");
        file.write_all(row).unwrap();
    }

    if with_memo {
        let next_free = FPT_HEADER_AREA / u32::from(BLOCK_SIZE);
        let mut fpt = File::create(path.with_extension("fpt")).unwrap();
        fpt.write_all(MemoHeader::new(next_free, BLOCK_SIZE).as_bytes())
            .unwrap();
        fpt.write_all(&vec![0u8; FPT_HEADER_AREA as usize - 8]).unwrap();
    }

    path
}

fn write_table(dir: &Path, name: &str, columns: &[ColumnSpec], rows: &[Vec<u8>]) -> PathBuf {
    write_table_full(dir, name, FOXPRO, 0x03, columns, rows, false)
}

/// Appends a memo block at `block * BLOCK_SIZE` of an existing FPT.
fn write_memo_block(fpt_path: &Path, block: u32, sign: u32, payload: &[u8]) {
    use std::io::Seek;
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .open(fpt_path)
        .unwrap();
    file.seek(std::io::SeekFrom::Start(u64::from(block) * u64::from(BLOCK_SIZE)))
        .unwrap();
    let mut block_bytes = vec![0u8; usize::from(BLOCK_SIZE)];
    block_bytes[..4].copy_from_slice(&sign.to_be_bytes());
    block_bytes[4..8].copy_from_slice(&(payload.len() as u32).to_be_bytes());
    block_bytes[8..8 + payload.len()].copy_from_slice(payload);
    file.write_all(&block_bytes).unwrap();
}

fn raw_row(parts: &[&[u8]]) -> Vec<u8> {
    let mut row = vec![b' '];
    for part in parts {
        row.extend_from_slice(part);
    }
    row
}

fn open(path: &Path) -> Dbf {
    Dbf::open(Config::new(path, Box::new(UnicodeConverter::default()))).unwrap()
}

fn people_fixture(dir: &TempDir) -> PathBuf {
    write_table(
        dir.path(),
        "people.dbf",
        &[
            ("NAME", ColumnType::Character, 10, 0),
            ("AGE", ColumnType::Numeric, 3, 0),
        ],
        &[
            raw_row(&[b"ALICE     ", b" 42"]),
            raw_row(&[b"BOB       ", b" 17"]),
        ],
    )
}

mod scenarios {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn character_and_numeric_columns_decode() {
        let dir = tempdir().unwrap();
        let path = people_fixture(&dir);
        let dbf = open(&path);

        let row = dbf.row().unwrap();
        assert_eq!(
            row.field("NAME").unwrap().value(),
            &Value::Character("ALICE     ".to_string())
        );
        assert_eq!(row.field("AGE").unwrap().value(), &Value::Numeric(42));
    }

    #[test]
    fn date_column_decodes() {
        let dir = tempdir().unwrap();
        let path = write_table(
            dir.path(),
            "dates.dbf",
            &[("D", ColumnType::Date, 8, 0)],
            &[raw_row(&[b"20240131"])],
        );
        let dbf = open(&path);

        let row = dbf.row().unwrap();
        assert_eq!(
            row.field("D").unwrap().value(),
            &Value::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap())
        );
    }

    #[test]
    fn datetime_column_decodes() {
        let mut slot = Vec::new();
        slot.extend_from_slice(&2_460_341u32.to_le_bytes());
        slot.extend_from_slice(&45_000_000u32.to_le_bytes());

        let dir = tempdir().unwrap();
        let path = write_table(
            dir.path(),
            "stamps.dbf",
            &[("T", ColumnType::DateTime, 8, 0)],
            &[raw_row(&[&slot])],
        );
        let dbf = open(&path);

        let row = dbf.row().unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(row.field("T").unwrap().value(), &Value::DateTime(expected));
    }

    #[test]
    fn currency_column_decodes() {
        let dir = tempdir().unwrap();
        let path = write_table(
            dir.path(),
            "prices.dbf",
            &[("PRICE", ColumnType::Currency, 8, 4)],
            &[raw_row(&[&12_345_000i64.to_le_bytes()])],
        );
        let dbf = open(&path);

        let row = dbf.row().unwrap();
        assert_eq!(row.field("PRICE").unwrap().value(), &Value::Float(1234.5));
    }

    #[test]
    fn append_survives_a_reopen() {
        let dir = tempdir().unwrap();
        let path = write_table(
            dir.path(),
            "append.dbf",
            &[("NAME", ColumnType::Character, 10, 0)],
            &[raw_row(&[b"ALICE     "])],
        );

        let dbf = open(&path);
        let mut fresh = dbf.new_row();
        fresh
            .set("NAME", Value::Character("BOB".to_string()))
            .unwrap();
        dbf.write_row(&fresh).unwrap();
        assert_eq!(dbf.rows_count(), 2);
        dbf.close().unwrap();

        let dbf = open(&path);
        assert_eq!(dbf.rows_count(), 2);
        dbf.goto(1).unwrap();
        let row = dbf.row().unwrap();
        assert_eq!(
            row.field("NAME").unwrap().value(),
            &Value::Character("BOB       ".to_string())
        );
    }
}

mod cursor {
    use super::*;

    #[test]
    fn goto_past_the_end_clamps_and_fails() {
        let dir = tempdir().unwrap();
        let dbf = open(&people_fixture(&dir));

        let err = dbf.goto(5).unwrap_err();
        assert_eq!(err.downcast_ref::<DbfError>(), Some(&DbfError::Eof));
        assert_eq!(dbf.position(), 2);

        dbf.goto(1).unwrap();
        assert_eq!(dbf.position(), 1);
    }

    #[test]
    fn skip_clamps_into_bounds() {
        let dir = tempdir().unwrap();
        let dbf = open(&people_fixture(&dir));

        dbf.skip(100);
        assert_eq!(dbf.position(), 2);

        dbf.skip(-100);
        assert_eq!(dbf.position(), 0);

        dbf.skip(1);
        assert_eq!(dbf.position(), 1);
    }

    #[test]
    fn reading_at_the_end_is_eof() {
        let dir = tempdir().unwrap();
        let dbf = open(&people_fixture(&dir));

        dbf.skip(100);
        let err = dbf.row().unwrap_err();
        assert_eq!(err.downcast_ref::<DbfError>(), Some(&DbfError::Eof));

        let err = dbf.deleted().unwrap_err();
        assert_eq!(err.downcast_ref::<DbfError>(), Some(&DbfError::Eof));
    }

    #[test]
    fn deleted_detects_the_marker_byte() {
        let mut dead = raw_row(&[b"CHARLIE   ", b" 99"]);
        dead[0] = DELETED;

        let dir = tempdir().unwrap();
        let path = write_table(
            dir.path(),
            "mixed.dbf",
            &[
                ("NAME", ColumnType::Character, 10, 0),
                ("AGE", ColumnType::Numeric, 3, 0),
            ],
            &[raw_row(&[b"ALICE     ", b" 42"]), dead],
        );
        let dbf = open(&path);

        assert!(!dbf.deleted().unwrap());
        dbf.goto(1).unwrap();
        assert!(dbf.deleted().unwrap());

        let live = dbf.rows(true).unwrap();
        assert_eq!(live.len(), 1);
        let all = dbf.rows(false).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[1].deleted());
    }
}

mod writes {
    use super::*;

    #[test]
    fn overwriting_in_place_keeps_the_row_count() {
        let dir = tempdir().unwrap();
        let path = people_fixture(&dir);
        let dbf = open(&path);

        dbf.goto(1).unwrap();
        let mut row = dbf.row().unwrap();
        row.set("AGE", Value::Numeric(18)).unwrap();
        dbf.write_row(&row).unwrap();

        assert_eq!(dbf.rows_count(), 2);
        dbf.goto(1).unwrap();
        assert_eq!(dbf.row().unwrap().field("AGE").unwrap().value(), &Value::Numeric(18));
    }

    #[test]
    fn appends_land_at_the_previous_end_of_data() {
        let dir = tempdir().unwrap();
        let path = people_fixture(&dir);
        let dbf = open(&path);

        let end_before = u64::from(dbf.first_row()) + 2 * u64::from(dbf.row_length());
        let mut fresh = dbf.new_row();
        fresh
            .set("NAME", Value::Character("CAROL".to_string()))
            .unwrap();
        fresh.set("AGE", Value::Numeric(33)).unwrap();
        dbf.write_row(&fresh).unwrap();
        assert_eq!(dbf.rows_count(), 3);
        dbf.close().unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let slot = &bytes[end_before as usize..end_before as usize + 14];
        assert_eq!(slot, b" CAROL      33");
    }

    #[test]
    fn deletion_flag_round_trips_through_a_write() {
        let dir = tempdir().unwrap();
        let path = people_fixture(&dir);
        let dbf = open(&path);

        let mut row = dbf.row().unwrap();
        row.set_deleted(true);
        dbf.write_row(&row).unwrap();

        dbf.goto(0).unwrap();
        assert!(dbf.deleted().unwrap());
        assert!(dbf.row().unwrap().deleted());
    }

    #[test]
    fn writes_with_advisory_locking_enabled() {
        let dir = tempdir().unwrap();
        let path = people_fixture(&dir);
        let dbf = Dbf::open(
            Config::new(&path, Box::new(UnicodeConverter::default())).write_lock(true),
        )
        .unwrap();

        let mut row = dbf.row().unwrap();
        row.set("AGE", Value::Numeric(43)).unwrap();
        dbf.write_row(&row).unwrap();

        dbf.write_lock(false);
        row.set("AGE", Value::Numeric(44)).unwrap();
        dbf.write_row(&row).unwrap();

        dbf.goto(0).unwrap();
        assert_eq!(dbf.row().unwrap().field("AGE").unwrap().value(), &Value::Numeric(44));
    }

    #[test]
    fn writes_restamp_the_modification_date() {
        let dir = tempdir().unwrap();
        let path = people_fixture(&dir);
        let dbf = open(&path);

        let row = dbf.row().unwrap();
        dbf.write_row(&row).unwrap();
        assert_eq!(dbf.modified(), chrono::Local::now().date_naive());
    }
}

mod memo {
    use super::*;

    fn notes_fixture(dir: &TempDir) -> PathBuf {
        write_table_full(
            dir.path(),
            "notes.dbf",
            FOXPRO,
            0x03,
            &[
                ("TITLE", ColumnType::Character, 10, 0),
                ("BODY", ColumnType::Memo, 4, 0),
            ],
            &[],
            true,
        )
    }

    #[test]
    fn memo_write_read_round_trip() {
        let dir = tempdir().unwrap();
        let path = notes_fixture(&dir);
        let dbf = open(&path);

        let block_ref = dbf.write_memo(b"hello", true, 5).unwrap();
        let (payload, is_text) = dbf.read_memo(&block_ref).unwrap();
        assert_eq!(payload, b"hello");
        assert!(is_text);

        let fpt = std::fs::read(path.with_extension("fpt")).unwrap();
        assert_eq!(&fpt[..4], &9u32.to_be_bytes()[..], "next_free grew by one");
    }

    #[test]
    fn binary_memos_keep_their_bytes() {
        let dir = tempdir().unwrap();
        let dbf = open(&notes_fixture(&dir));

        let block_ref = dbf.write_memo(&[0xDE, 0xAD, 0xBE, 0xEF], false, 4).unwrap();
        let (payload, is_text) = dbf.read_memo(&block_ref).unwrap();
        assert_eq!(payload, [0xDE, 0xAD, 0xBE, 0xEF]);
        assert!(!is_text);
    }

    #[test]
    fn memo_columns_resolve_through_the_fpt() {
        let dir = tempdir().unwrap();
        let path = write_table_full(
            dir.path(),
            "notes.dbf",
            FOXPRO,
            0x03,
            &[("BODY", ColumnType::Memo, 4, 0)],
            &[raw_row(&[&8u32.to_le_bytes()])],
            true,
        );
        write_memo_block(&path.with_extension("fpt"), 8, 1, b"hello");

        let dbf = open(&path);
        let row = dbf.row().unwrap();
        assert_eq!(
            row.field("BODY").unwrap().value(),
            &Value::Memo(b"hello".to_vec(), true)
        );
    }

    #[test]
    fn memo_fields_write_through_the_fpt() {
        let dir = tempdir().unwrap();
        let path = notes_fixture(&dir);
        let dbf = open(&path);

        let mut row = dbf.new_row();
        row.set("TITLE", Value::Character("greeting".to_string()))
            .unwrap();
        row.set("BODY", Value::Memo(b"hello there".to_vec(), true))
            .unwrap();
        dbf.write_row(&row).unwrap();

        dbf.goto(0).unwrap();
        let read_back = dbf.row().unwrap();
        assert_eq!(
            read_back.field("BODY").unwrap().value(),
            &Value::Memo(b"hello there".to_vec(), true)
        );
    }

    #[test]
    fn empty_memo_blocks_read_as_empty() {
        let dir = tempdir().unwrap();
        let dbf = open(&notes_fixture(&dir));

        let block_ref = dbf.write_memo(b"", true, 0).unwrap();
        let (payload, is_text) = dbf.read_memo(&block_ref).unwrap();
        assert!(payload.is_empty());
        assert!(is_text);
    }

    #[test]
    fn memo_operations_without_an_fpt_fail() {
        let dir = tempdir().unwrap();
        let dbf = open(&people_fixture(&dir));

        let err = dbf.write_memo(b"hello", true, 5).unwrap_err();
        assert_eq!(err.downcast_ref::<DbfError>(), Some(&DbfError::NoFpt));

        let err = dbf.read_memo(&8u32.to_le_bytes()).unwrap_err();
        assert_eq!(err.downcast_ref::<DbfError>(), Some(&DbfError::NoFpt));
    }
}

mod search {
    use super::*;

    #[test]
    fn loose_search_matches_substrings() {
        let dir = tempdir().unwrap();
        let dbf = open(&people_fixture(&dir));

        let field = dbf
            .new_field("NAME", Value::Character("LIC".to_string()))
            .unwrap();
        let rows = dbf.search(&field, false).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].field("NAME").unwrap().value(),
            &Value::Character("ALICE     ".to_string())
        );
    }

    #[test]
    fn exact_search_needs_the_full_slot() {
        let dir = tempdir().unwrap();
        let dbf = open(&people_fixture(&dir));

        let field = dbf
            .new_field("NAME", Value::Character("BOB".to_string()))
            .unwrap();
        assert_eq!(dbf.search(&field, true).unwrap().len(), 1);

        let field = dbf
            .new_field("NAME", Value::Character("BO".to_string()))
            .unwrap();
        assert_eq!(dbf.search(&field, true).unwrap().len(), 0);
        assert_eq!(dbf.search(&field, false).unwrap().len(), 1);
    }

    #[test]
    fn numeric_search_matches_encoded_slots() {
        let dir = tempdir().unwrap();
        let dbf = open(&people_fixture(&dir));

        let field = dbf.new_field("AGE", Value::Numeric(42)).unwrap();
        let rows = dbf.search(&field, true).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].position(), 0);
    }

    #[test]
    fn memo_search_is_rejected() {
        let dir = tempdir().unwrap();
        let path = write_table_full(
            dir.path(),
            "notes.dbf",
            FOXPRO,
            0x03,
            &[("BODY", ColumnType::Memo, 4, 0)],
            &[],
            true,
        );
        let dbf = open(&path);

        let field = dbf
            .new_field("BODY", Value::Memo(b"hello".to_vec(), true))
            .unwrap();
        let err = dbf.search(&field, false).unwrap_err();
        assert_eq!(err.downcast_ref::<DbfError>(), Some(&DbfError::SearchMemo));
    }
}

mod opening {
    use super::*;

    #[test]
    fn unknown_versions_need_the_untested_override() {
        let dir = tempdir().unwrap();
        let path = write_table_full(
            dir.path(),
            "old.dbf",
            0x83,
            0x03,
            &[("NAME", ColumnType::Character, 10, 0)],
            &[],
            false,
        );

        let err = Dbf::open(Config::new(&path, Box::new(UnicodeConverter::default())))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbfError>(),
            Some(&DbfError::UnsupportedVersion(0x83))
        );

        let dbf = Dbf::open(
            Config::new(&path, Box::new(UnicodeConverter::default())).untested(true),
        )
        .unwrap();
        assert_eq!(dbf.file_type(), 0x83);
    }

    #[test]
    fn code_page_validation_compares_against_the_converter() {
        let dir = tempdir().unwrap();
        let path = write_table_full(
            dir.path(),
            "cyrillic.dbf",
            FOXPRO,
            0xC9,
            &[("NAME", ColumnType::Character, 10, 0)],
            &[],
            false,
        );

        let err = Dbf::open(
            Config::new(&path, Box::new(UnicodeConverter::default())).code_page_validation(true),
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbfError>(),
            Some(&DbfError::CodePageMismatch {
                header: 0xC9,
                converter: 0x03
            })
        );

        let dbf = Dbf::open(
            Config::new(&path, Box::new(UnicodeConverter::new(0xC9)))
                .code_page_validation(true),
        )
        .unwrap();
        assert_eq!(dbf.code_page(), 0xC9);
    }

    #[test]
    fn a_missing_fpt_fails_the_open() {
        let dir = tempdir().unwrap();
        let path = write_table_full(
            dir.path(),
            "notes.dbf",
            FOXPRO,
            0x03,
            &[("BODY", ColumnType::Memo, 4, 0)],
            &[],
            true,
        );
        std::fs::remove_file(path.with_extension("fpt")).unwrap();

        assert!(Dbf::open(Config::new(&path, Box::new(UnicodeConverter::default()))).is_err());
    }

    #[test]
    fn trim_spaces_presents_character_values_trimmed() {
        let dir = tempdir().unwrap();
        let path = people_fixture(&dir);
        let dbf = Dbf::open(
            Config::new(&path, Box::new(UnicodeConverter::default())).trim_spaces(true),
        )
        .unwrap();

        let row = dbf.row().unwrap();
        assert_eq!(
            row.field("NAME").unwrap().value(),
            &Value::Character("ALICE".to_string())
        );
    }

    #[test]
    fn column_metadata_is_exposed() {
        let dir = tempdir().unwrap();
        let dbf = open(&people_fixture(&dir));

        assert_eq!(dbf.column_names(), ["NAME", "AGE"]);
        let age = dbf.column("age").unwrap();
        assert_eq!(age.column_type, ColumnType::Numeric);
        assert_eq!(age.length, 3);
        assert_eq!(dbf.row_length(), 14);
        assert_eq!(dbf.first_row(), 97);
        assert_eq!(dbf.rows_count(), 2);
    }
}
