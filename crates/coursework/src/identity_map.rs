//! The identity map: which version-control identities belong to which LMS account.
//!
//! The map is parsed once from a delimited table whose header names the
//! columns. Which columns hold the LMS and VCS identities is configuration
//! ([`MappingColumns`]), because operators build the table from arbitrary
//! roster exports. Every other column is carried along as opaque metadata.
//!
//! Rows sharing an LMS id are merged into one record holding several VCS
//! identities, provided their metadata agrees. A VCS identity may belong to
//! one LMS account only, so backward lookups are unambiguous.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Read, Write};

use tracing::debug;

use crate::{CourseMember, IdentityMapError, LmsId, VcsId};

/// Column name the wizard writes for the LMS identity.
pub const DEFAULT_LMS_COLUMN: &str = "canvas_id";

/// Column name the wizard writes for the VCS identity.
pub const DEFAULT_VCS_COLUMN: &str = "git_id";

/// Which columns of the table play which role, and how cells are separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingColumns {
    pub lms_column: String,
    pub vcs_column: String,
    pub delimiter: u8,
}

impl Default for MappingColumns {
    fn default() -> Self {
        Self {
            lms_column: DEFAULT_LMS_COLUMN.to_string(),
            vcs_column: DEFAULT_VCS_COLUMN.to_string(),
            delimiter: b',',
        }
    }
}

/// One LMS account and everything the table says about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub lms_id: LmsId,
    /// Never empty; usually a single identity.
    pub vcs_ids: BTreeSet<VcsId>,
    /// Remaining columns (display name, email, ...), keyed by header.
    pub attributes: BTreeMap<String, String>,
}

/// Read-only lookup between LMS accounts and VCS identities.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    records: Vec<IdentityRecord>,
    forward: HashMap<LmsId, usize>,
    backward: HashMap<VcsId, usize>,
}

impl IdentityMap {
    /// Parses a mapping table.
    ///
    /// # Errors
    ///
    /// - [`IdentityMapError::MalformedMapping`] if a configured column is absent.
    /// - [`IdentityMapError::EmptyIdentity`] if a row leaves an identity blank.
    /// - [`IdentityMapError::DuplicateIdentity`] if an LMS id repeats with
    ///   different metadata, or a VCS id is claimed by two LMS ids.
    pub fn load<R: Read>(source: R, columns: &MappingColumns) -> Result<Self, IdentityMapError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(columns.delimiter)
            .trim(csv::Trim::All)
            .from_reader(source);

        let headers: Vec<String> = reader
            .headers()
            .map_err(read_error)?
            .iter()
            .map(str::to_string)
            .collect();
        let lms_index = column_index(&headers, &columns.lms_column)?;
        let vcs_index = column_index(&headers, &columns.vcs_column)?;

        let mut map = IdentityMap::default();
        for (index, row) in reader.records().enumerate() {
            // Header is row 1.
            let row_number = index as u64 + 2;
            let row = row.map_err(read_error)?;

            let lms_id = LmsId::new(row.get(lms_index).unwrap_or("")).ok_or_else(|| {
                IdentityMapError::EmptyIdentity {
                    row: row_number,
                    column: columns.lms_column.clone(),
                }
            })?;
            let vcs_id = VcsId::new(row.get(vcs_index).unwrap_or("")).ok_or_else(|| {
                IdentityMapError::EmptyIdentity {
                    row: row_number,
                    column: columns.vcs_column.clone(),
                }
            })?;
            let attributes = headers
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != lms_index && *i != vcs_index)
                .map(|(i, name)| (name.clone(), row.get(i).unwrap_or("").to_string()))
                .collect();

            map.insert(row_number, columns, lms_id, vcs_id, attributes)?;
        }

        debug!(
            accounts = map.records.len(),
            identities = map.backward.len(),
            "identity map loaded"
        );
        Ok(map)
    }

    fn insert(
        &mut self,
        row: u64,
        columns: &MappingColumns,
        lms_id: LmsId,
        vcs_id: VcsId,
        attributes: BTreeMap<String, String>,
    ) -> Result<(), IdentityMapError> {
        let slot = match self.forward.get(&lms_id) {
            Some(&slot) => {
                if self.records[slot].attributes != attributes {
                    return Err(IdentityMapError::DuplicateIdentity {
                        row,
                        column: columns.lms_column.clone(),
                        value: lms_id.to_string(),
                    });
                }
                slot
            }
            None => {
                self.records.push(IdentityRecord {
                    lms_id: lms_id.clone(),
                    vcs_ids: BTreeSet::new(),
                    attributes,
                });
                let slot = self.records.len() - 1;
                self.forward.insert(lms_id, slot);
                slot
            }
        };

        match self.backward.get(&vcs_id) {
            Some(&owner) if owner != slot => Err(IdentityMapError::DuplicateIdentity {
                row,
                column: columns.vcs_column.clone(),
                value: vcs_id.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.records[slot].vcs_ids.insert(vcs_id.clone());
                self.backward.insert(vcs_id, slot);
                Ok(())
            }
        }
    }

    /// VCS identities of an LMS account.
    pub fn resolve_forward(&self, lms_id: &LmsId) -> Option<&BTreeSet<VcsId>> {
        self.forward
            .get(lms_id)
            .map(|&slot| &self.records[slot].vcs_ids)
    }

    /// LMS account owning a VCS identity.
    pub fn resolve_backward(&self, vcs_id: &VcsId) -> Option<&LmsId> {
        self.backward
            .get(vcs_id)
            .map(|&slot| &self.records[slot].lms_id)
    }

    /// Full record of an LMS account.
    pub fn record(&self, lms_id: &LmsId) -> Option<&IdentityRecord> {
        self.forward.get(lms_id).map(|&slot| &self.records[slot])
    }

    /// Number of LMS accounts in the map.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn column_index(headers: &[String], column: &str) -> Result<usize, IdentityMapError> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| IdentityMapError::MalformedMapping {
            column: column.to_string(),
            found: headers.to_vec(),
        })
}

fn read_error(err: csv::Error) -> IdentityMapError {
    let row = err.position().map(|p| p.line()).unwrap_or(0);
    if err.is_io_error() {
        return IdentityMapError::Io(err.into());
    }
    IdentityMapError::MalformedRow {
        row,
        message: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Building tables
// ---------------------------------------------------------------------------

/// A mapping table under construction, before it is written to disk.
///
/// Produced by the mapping wizard from the course's student list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MappingTable {
    /// Builds a table with the LMS login and the chosen profile field under
    /// the header names in `columns`, and `extra_fields` after them, so that
    /// [`IdentityMap::load`] reads it back with the same `columns`.
    ///
    /// Missing fields become empty cells; the LMS's test account is skipped.
    pub fn from_members(
        members: &[CourseMember],
        vcs_field: &str,
        extra_fields: &[String],
        columns: &MappingColumns,
    ) -> Self {
        let mut header = vec![columns.lms_column.clone(), columns.vcs_column.clone()];
        header.extend(extra_fields.iter().cloned());

        let rows = members
            .iter()
            .filter(|m| !m.is_test_student())
            .map(|member| {
                let mut row = vec![
                    member.field(CourseMember::LOGIN_FIELD).to_string(),
                    member.field(vcs_field).to_string(),
                ];
                row.extend(extra_fields.iter().map(|f| member.field(f).to_string()));
                row
            })
            .collect();

        Self {
            columns: header,
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows missing either identity; such a table will not load.
    pub fn incomplete_rows(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.iter().take(2).any(|cell| cell.trim().is_empty()))
            .count()
    }

    /// Writes the table with a header row.
    pub fn write<W: Write>(&self, sink: W, delimiter: u8) -> Result<(), IdentityMapError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(sink);
        writer
            .write_record(&self.columns)
            .map_err(|e| IdentityMapError::Io(e.into()))?;
        for row in &self.rows {
            writer
                .write_record(row)
                .map_err(|e| IdentityMapError::Io(e.into()))?;
        }
        writer.flush().map_err(IdentityMapError::Io)
    }
}
