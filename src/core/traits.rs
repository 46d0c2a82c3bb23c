use crate::core::rows::{Table, TableBatch, Tables};

/// Writes normalized tables to a sink (files, document stores, etc.).
pub trait TableSink {
    /// Writes all rows of one table and returns the number of rows written.
    ///
    /// The table is complete when this returns: file sinks write a temp file
    /// and rename it into place before returning.
    fn emit(&mut self, batch: TableBatch<'_>) -> std::io::Result<u64>;
    /// Called once after the last table. Sinks that finish each table in
    /// `emit` have nothing left to do here; sinks holding a connection or
    /// shared buffer release it.
    fn close(&mut self) -> std::io::Result<()>;
}

/// Emits every table in `Table::ALL` order, then closes the sink.
pub fn emit_tables(sink: &mut dyn TableSink, tables: &Tables) -> std::io::Result<u64> {
    let mut total = 0;
    for table in Table::ALL {
        total += sink.emit(tables.batch(table))?;
    }
    sink.close()?;
    Ok(total)
}
