//! Database Module
//!
//! VS Code `state.vscdb`(SQLite) 관리.
//! 행 저장 엔진은 SQLite에 맡기고, 여기서는 ItemTable 키-값 접근만 제공합니다.

mod schema;

use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension};

use crate::error::VscseError;

pub use schema::ITEM_TABLE;

/// 열기 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// vscdb 래퍼
///
/// 호스트 앱이 같은 파일을 읽기/쓰기로 열고 있지 않다고 가정합니다.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// 기존 vscdb 파일 열기 (새로 만들지 않음)
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self, VscseError> {
        let flags = match mode {
            OpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            OpenMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
        } | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;

        let conn = Connection::open_with_flags(path, flags)?;
        Ok(Self { conn })
    }

    /// 새 vscdb 생성 (없으면 만들고 스키마 초기화)
    pub fn create(path: &Path) -> Result<Self, VscseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Self {
            conn: Connection::open(path)?,
        };
        db.initialize()?;
        Ok(db)
    }

    /// 인메모리 DB (테스트용)
    pub fn in_memory() -> Result<Self, VscseError> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.initialize()?;
        Ok(db)
    }

    /// ItemTable 스키마 초기화
    pub fn initialize(&self) -> Result<(), VscseError> {
        self.conn.execute_batch(schema::CREATE_SCHEMA)?;
        Ok(())
    }

    /// ItemTable에 key/value 컬럼이 모두 있는지 확인
    pub fn has_item_table(&self) -> Result<bool, VscseError> {
        let count: i64 = self
            .conn
            .query_row(schema::TABLE_EXISTS, [ITEM_TABLE], |row| row.get(0))?;
        if count == 0 {
            return Ok(false);
        }

        let mut stmt = self.conn.prepare("PRAGMA table_info(ItemTable)")?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(columns.iter().any(|c| c == "key") && columns.iter().any(|c| c == "value"))
    }

    /// prefix로 시작하는 모든 키 조회 (LIKE 이스케이프를 피하려고 substr 비교)
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, VscseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM ItemTable WHERE substr(key, 1, length(?1)) = ?1")?;
        let keys = stmt
            .query_map([prefix], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// 값 조회. TEXT/BLOB 어느 쪽으로 저장되어 있어도 바이트로 반환
    pub fn get_value(&self, key: &str) -> Result<Option<Vec<u8>>, VscseError> {
        let value = self
            .conn
            .query_row("SELECT value FROM ItemTable WHERE key = ?1", [key], |row| {
                Ok(match row.get_ref(0)? {
                    ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(bytes.to_vec()),
                    _ => None,
                })
            })
            .optional()?;
        Ok(value.flatten())
    }

    /// 값 저장 (같은 키는 통째로 교체)
    pub fn put_value(&self, key: &str, value: &str) -> Result<(), VscseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO ItemTable (key, value) VALUES (?1, ?2)",
            (key, value),
        )?;
        Ok(())
    }

    /// 키 존재 여부
    pub fn contains(&self, key: &str) -> Result<bool, VscseError> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM ItemTable WHERE key = ?1 LIMIT 1", [key], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// 키 삭제. 삭제된 행이 있으면 true
    pub fn delete(&self, key: &str) -> Result<bool, VscseError> {
        let changed = self
            .conn
            .execute("DELETE FROM ItemTable WHERE key = ?1", [key])?;
        Ok(changed > 0)
    }
}
