//! Database Schema
//!
//! VS Code `state.vscdb` 스키마 정의

/// 키-값 테이블 이름
pub const ITEM_TABLE: &str = "ItemTable";

/// 새 vscdb 생성 시 사용하는 스키마 (VS Code와 동일)
pub const CREATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ItemTable (
    key TEXT UNIQUE ON CONFLICT REPLACE,
    value BLOB
);
"#;

/// ItemTable 존재 확인
pub const TABLE_EXISTS: &str =
    "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1";
