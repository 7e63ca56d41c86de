use std::cell::RefCell;

use super::{DatabaseDriver, DriverError, Row};
use crate::schema::{GenericDataType, Relationship, TableColumn, TableRef};

/// In-memory driver for tests: the catalog is declared up front and `exec`
/// answers with a canned response while recording every statement it sees.
#[derive(Debug, Default)]
pub struct FakeDriver {
    columns: Vec<TableColumn>,
    relationships: Vec<Relationship>,
    exec_response: Option<Vec<Row>>,
    executed: RefCell<Vec<String>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_column(
        &mut self,
        table: &TableRef,
        name: &str,
        generic_data_type: GenericDataType,
        primary_key: bool,
    ) -> &mut Self {
        self.columns.push(TableColumn {
            schema_name: table.schema_name.clone(),
            table_name: table.table_name.clone(),
            name: name.to_string(),
            data_type: format!("{:?}", generic_data_type).to_lowercase(),
            generic_data_type,
            is_nullable: !primary_key,
            included_in_primary_key: primary_key,
        });
        self
    }

    pub fn define_relationship(
        &mut self,
        local_table: &TableRef,
        local_column: &str,
        foreign_table: &TableRef,
        foreign_column: &str,
    ) -> &mut Self {
        self.relationships.push(Relationship::new(
            local_table.clone(),
            local_column,
            foreign_table.clone(),
            foreign_column,
        ));
        self
    }

    pub fn mock_exec_response(&mut self, rows: Vec<Row>) {
        self.exec_response = Some(rows);
    }

    /// Every statement passed to `exec`, oldest first
    pub fn executed_sql(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }
}

impl DatabaseDriver for FakeDriver {
    fn get_all_columns_in_database(&self) -> Result<Vec<TableColumn>, DriverError> {
        Ok(self.columns.clone())
    }

    fn get_all_foreign_keys_in_database(&self) -> Result<Vec<Relationship>, DriverError> {
        Ok(self.relationships.clone())
    }

    fn exec(&self, sql: &str) -> Result<Vec<Row>, DriverError> {
        self.executed.borrow_mut().push(sql.to_string());
        self.exec_response.clone().ok_or_else(|| {
            DriverError::Other(
                "Call mock_exec_response() before calling exec() on FakeDriver".to_string(),
            )
        })
    }

    fn test_connection(&self) -> Result<(), DriverError> {
        Ok(())
    }
}
