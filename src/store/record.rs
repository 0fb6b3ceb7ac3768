//! Records
//!
//! A [`Record`] is a model snapshot plus the store it came from. Plain
//! fields are replaced with [`Record::edit`], which returns a new record and
//! leaves the old one untouched. Array fields are changed in place with
//! [`Record::mutate_array`], which the backend applies as a single
//! `array_append`/`array_remove` so concurrent writers adding distinct
//! elements do not overwrite each other.

use crate::database::schema::SqlType;
use crate::database::statement::{ArrayOp, Assignment, Predicate};
use crate::database::value::FieldValue;
use crate::error::{Result, StoreError, ValidationError};
use crate::models::Model;
use crate::store::{Fields, Store};
use std::fmt;
use std::ops::Deref;

/// A model snapshot bound to its store
#[derive(Clone)]
pub struct Record<T: Model> {
    model: T,
    store: Store,
}

impl<T: Model> Record<T> {
    pub(crate) fn new(model: T, store: Store) -> Self {
        Self { model, store }
    }

    /// The typed snapshot
    pub fn model(&self) -> &T {
        &self.model
    }

    /// Unwrap the typed snapshot
    pub fn into_model(self) -> T {
        self.model
    }

    /// Field access by column name or alias
    pub fn get(&self, field: &str) -> Result<FieldValue> {
        let table = T::TABLE;
        let no_such_field = || StoreError::NoSuchField {
            table: table.to_string(),
            field: field.to_string(),
        };
        let column = table.resolve(field).ok_or_else(no_such_field)?;
        self.model
            .to_row()
            .get(column)
            .cloned()
            .ok_or_else(no_such_field)
    }

    /// Replace fields on this record's row.
    ///
    /// Returns the row as written. This record is left as it was.
    pub async fn edit(&self, fields: Fields) -> Result<Record<T>> {
        let filter = Predicate::eq(T::TABLE.primary_key(), self.model.key());
        self.edit_where(filter, fields).await
    }

    /// Replace fields on every row matching `filter`.
    ///
    /// Filter columns may use aliases. Every updated row is cached; the one
    /// returned is this record's row if it matched, otherwise the first.
    /// Fails with `NotFound` when no row matches. The primary key cannot be
    /// edited. An empty payload writes nothing and returns a copy of this
    /// record.
    pub async fn edit_where(&self, filter: Predicate, fields: Fields) -> Result<Record<T>> {
        let table = T::TABLE;
        let values = fields.resolve(table)?;
        if let Some((column, _)) = values.iter().find(|(c, _)| c.as_str() == table.primary_key()) {
            return Err(ValidationError::PrimaryKey {
                table: table.to_string(),
                column: column.clone(),
            }
            .into());
        }

        let filter = filter
            .terms()
            .iter()
            .fold(Predicate::new(), |resolved, (column, value)| {
                let physical = table.resolve(column).unwrap_or(column.as_str());
                resolved.and(physical, value.clone())
            });
        table.validate(filter.terms().iter().map(|(c, v)| (c.as_str(), v)))?;

        if values.is_empty() {
            return Ok(self.clone());
        }
        let assignments = values
            .into_iter()
            .map(|(column, value)| Assignment::Replace(column, value))
            .collect();
        let key = self.model.key();
        self.store.update::<T>(assignments, filter, Some(&key)).await
    }

    /// Append to or remove from an array column, updating this record in place
    pub async fn mutate_array(
        &mut self,
        column: &str,
        op: ArrayOp,
        value: impl Into<FieldValue>,
    ) -> Result<()> {
        let table = T::TABLE;
        let value = value.into();
        let physical = table.resolve(column).unwrap_or(column);
        let def = table
            .column(physical)
            .ok_or_else(|| table.unknown_column(physical))?;

        let element = match def.ty {
            SqlType::Array(element) => element,
            SqlType::Scalar(_) => {
                return Err(ValidationError::TypeMismatch {
                    table: table.to_string(),
                    column: physical.to_string(),
                    expected: "an array column".to_string(),
                    found: def.ty.to_string(),
                }
                .into())
            }
        };
        if value.scalar_type() != Some(element) {
            return Err(ValidationError::TypeMismatch {
                table: table.to_string(),
                column: physical.to_string(),
                expected: element.to_string(),
                found: value.type_name(),
            }
            .into());
        }

        let key = self.model.key();
        let filter = Predicate::eq(table.primary_key(), key.clone());
        let assignment = Assignment::Mutate(physical.to_string(), op, value);
        let updated = self.store.update::<T>(vec![assignment], filter, Some(&key)).await?;
        self.model = updated.model;
        Ok(())
    }

    /// Re-read this record's row and replace the snapshot.
    ///
    /// Fails with `NotFound` if the row has been deleted.
    pub async fn refresh(&mut self) -> Result<()> {
        let key = self.model.key();
        match self.store.fetch::<T>(key.clone(), true).await? {
            Some(fresh) => {
                self.model = fresh.model;
                Ok(())
            }
            None => Err(StoreError::not_found(T::TABLE, key)),
        }
    }

    /// The store this record came from
    pub fn store(&self) -> &Store {
        &self.store
    }
}

impl<T: Model> Deref for Record<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.model
    }
}

impl<T: Model> PartialEq for Record<T> {
    fn eq(&self, other: &Self) -> bool {
        self.model == other.model
    }
}

impl<T: Model> PartialEq<T> for Record<T> {
    fn eq(&self, other: &T) -> bool {
        self.model == *other
    }
}

impl<T: Model> fmt::Debug for Record<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Record").field(&self.model).finish()
    }
}
