//! Defines the core data models and database queries for transactions.

use std::str::FromStr;

use rusqlite::{Connection, Row, types::Type};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};

use crate::{Error, database_id::TransactionId, workspace::WorkspaceId};

/// The largest amount accepted for a single transaction.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);
/// The most decimal places accepted in an amount.
pub const MAX_AMOUNT_SCALE: u32 = 2;

/// The largest inline (`data:` URI) attachment accepted, in bytes.
pub const MAX_INLINE_ATTACHMENT_BYTES: usize = 2 * 1024 * 1024;

// ============================================================================
// MODELS
// ============================================================================

/// Whether money came in or went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money earned.
    Income,
    /// Money spent.
    Expense,
}

impl TransactionType {
    /// The string stored in the database for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

/// A stored transaction type that is neither "income" nor "expense".
#[derive(Debug, thiserror::Error)]
#[error("unknown transaction type \"{0}\"")]
pub struct UnknownTransactionType(String);

impl FromStr for TransactionType {
    type Err = UnknownTransactionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(UnknownTransactionType(other.to_owned())),
        }
    }
}

/// A reference to a receipt image attached to a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum AttachmentRef {
    /// A link to an image hosted elsewhere.
    Url(String),
    /// The image itself, encoded as a `data:` URI.
    Inline(String),
}

impl AttachmentRef {
    /// Classify a raw attachment string, `None` if it is blank.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();

        if raw.is_empty() {
            None
        } else if raw.starts_with("data:") {
            Some(AttachmentRef::Inline(raw.to_owned()))
        } else {
            Some(AttachmentRef::Url(raw.to_owned()))
        }
    }

    /// The raw string, as stored.
    pub fn as_str(&self) -> &str {
        match self {
            AttachmentRef::Url(url) => url,
            AttachmentRef::Inline(data) => data,
        }
    }
}

/// An expense or income recorded in a workspace.
///
/// Transactions are immutable once created, they can only be deleted.
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The workspace the transaction belongs to.
    pub workspace_id: WorkspaceId,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The amount of money spent or earned, always greater than zero.
    ///
    /// Whether the money came in or went out is given by `transaction_type`.
    pub amount: Decimal,
    /// Whether the transaction is an income or an expense.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// A free-form category label, e.g. "Kira".
    pub category: Option<String>,
    /// When the transaction happened, if known.
    #[serde(with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
    /// The name of the user who recorded the transaction.
    pub added_by: Option<String>,
    /// A receipt for the transaction.
    pub attachment: Option<AttachmentRef>,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [NewTransaction] for discoverability.
    pub fn build(workspace_id: WorkspaceId, amount: Decimal, description: &str) -> NewTransaction {
        NewTransaction {
            workspace_id,
            description: description.to_owned(),
            amount,
            transaction_type: None,
            category: None,
            date: None,
            added_by: None,
            attachment: None,
        }
    }

    /// The amount with income positive and expenses negative.
    pub fn signed_amount(&self) -> Decimal {
        match self.transaction_type {
            TransactionType::Income => self.amount,
            TransactionType::Expense => -self.amount,
        }
    }

    /// Whether the transaction is an income.
    pub fn is_income(&self) -> bool {
        self.transaction_type == TransactionType::Income
    }

    /// Whether the transaction is an expense.
    pub fn is_expense(&self) -> bool {
        self.transaction_type == TransactionType::Expense
    }
}

/// A builder for creating [Transaction] instances.
///
/// The fields are checked by [NewTransaction::validate] before anything is
/// written to the store.
///
/// # Examples
///
/// ```ignore
/// use rust_decimal_macros::dec;
///
/// let transaction = Transaction::build(workspace_id, dec!(45.99), "Kahve")
///     .transaction_type(TransactionType::Expense)
///     .category("Gıda");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// The workspace the transaction will belong to.
    pub workspace_id: WorkspaceId,
    /// What the transaction was for, must not be blank.
    pub description: String,
    /// The magnitude of the transaction, must be greater than zero.
    pub amount: Decimal,
    /// Income or expense. Left `None` when the user did not choose one.
    pub transaction_type: Option<TransactionType>,
    /// A category label, blank labels are dropped.
    pub category: Option<String>,
    /// When the transaction happened.
    pub date: Option<OffsetDateTime>,
    /// The name of the user recording the transaction.
    pub added_by: Option<String>,
    /// A receipt image.
    pub attachment: Option<AttachmentRef>,
}

impl NewTransaction {
    /// Set whether the transaction is an income or an expense.
    pub fn transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    /// Set the category.
    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_owned());
        self
    }

    /// Set the date.
    pub fn date(mut self, date: OffsetDateTime) -> Self {
        self.date = Some(date);
        self
    }

    /// Set the author label.
    pub fn added_by(mut self, added_by: &str) -> Self {
        self.added_by = Some(added_by.to_owned());
        self
    }

    /// Set the receipt.
    pub fn attachment(mut self, attachment: Option<AttachmentRef>) -> Self {
        self.attachment = attachment;
        self
    }

    /// Check the transaction and normalise its fields.
    ///
    /// The description, category and author are trimmed, blank optional
    /// fields become `None` and the date is converted to UTC.
    ///
    /// # Errors
    /// This function will return a:
    /// - [Error::EmptyDescription] if the description is blank,
    /// - [Error::InvalidAmount] if the amount is zero or negative,
    /// - [Error::AmountTooLarge] if the amount is over [MAX_AMOUNT],
    /// - [Error::AmountTooPrecise] if the amount has more than [MAX_AMOUNT_SCALE] decimal places,
    /// - [Error::MissingTransactionType] if no type was chosen,
    /// - or [Error::AttachmentTooLarge] if an inline receipt is over the size limit.
    pub fn validate(self) -> Result<ValidatedTransaction, Error> {
        let description = self.description.trim();
        if description.is_empty() {
            return Err(Error::EmptyDescription);
        }

        if self.amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(self.amount));
        }

        if self.amount > MAX_AMOUNT {
            return Err(Error::AmountTooLarge(self.amount));
        }

        let amount = self.amount.normalize();
        if amount.scale() > MAX_AMOUNT_SCALE {
            return Err(Error::AmountTooPrecise(self.amount));
        }

        let transaction_type = self
            .transaction_type
            .ok_or(Error::MissingTransactionType)?;

        if let Some(AttachmentRef::Inline(data)) = &self.attachment
            && data.len() > MAX_INLINE_ATTACHMENT_BYTES
        {
            return Err(Error::AttachmentTooLarge(data.len()));
        }

        Ok(ValidatedTransaction {
            workspace_id: self.workspace_id,
            description: description.to_owned(),
            amount,
            transaction_type,
            category: non_blank(self.category),
            date: self.date.map(|date| date.to_offset(UtcOffset::UTC)),
            added_by: non_blank(self.added_by),
            attachment: self.attachment,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// A [NewTransaction] that passed validation and is ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTransaction {
    workspace_id: WorkspaceId,
    description: String,
    amount: Decimal,
    transaction_type: TransactionType,
    category: Option<String>,
    date: Option<OffsetDateTime>,
    added_by: Option<String>,
    attachment: Option<AttachmentRef>,
}

impl ValidatedTransaction {
    /// The workspace the transaction will belong to.
    pub fn workspace_id(&self) -> WorkspaceId {
        self.workspace_id
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workspace_id INTEGER NOT NULL,
                description TEXT NOT NULL,
                amount TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                category TEXT,
                date TEXT,
                added_by TEXT,
                attachment TEXT,
                FOREIGN KEY(workspace_id) REFERENCES workspace(id)
                    ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    // Every snapshot query filters on the workspace.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_workspace ON \"transaction\"(workspace_id);",
        (),
    )?;

    Ok(())
}

/// Insert a validated transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if the workspace does not exist,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn insert_transaction(
    transaction: ValidatedTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(
            "INSERT INTO \"transaction\"
                (workspace_id, description, amount, type, category, date, added_by, attachment)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             RETURNING id, workspace_id, description, amount, type, category, date, added_by,
                 attachment",
        )?
        .query_row(
            (
                transaction.workspace_id.as_i64(),
                transaction.description,
                transaction.amount.to_string(),
                transaction.transaction_type.as_str(),
                transaction.category,
                transaction.date,
                transaction.added_by,
                transaction
                    .attachment
                    .as_ref()
                    .map(|attachment| attachment.as_str().to_owned()),
            ),
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::NotFound,
            error => error.into(),
        })
}

/// Get every transaction in a workspace, in insertion order.
///
/// # Errors
/// This function will return a [Error::SqlError] if there is an SQL error.
pub fn list_transactions(
    workspace_id: WorkspaceId,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, workspace_id, description, amount, type, category, date, added_by,
                 attachment
             FROM \"transaction\" WHERE workspace_id = :workspace_id ORDER BY id",
        )?
        .query_map(
            &[(":workspace_id", &workspace_id.as_i64())],
            map_transaction_row,
        )?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Retrieve a transaction in `workspace_id` by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a transaction in the workspace,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(
    workspace_id: WorkspaceId,
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(
            "SELECT id, workspace_id, description, amount, type, category, date, added_by,
                 attachment
             FROM \"transaction\" WHERE id = ?1 AND workspace_id = ?2",
        )?
        .query_one((id, workspace_id.as_i64()), map_transaction_row)
        .map_err(|error| error.into())
}

/// Delete the transaction `id` from `workspace_id`.
///
/// # Errors
/// This function will return a:
/// - [Error::DeleteMissingTransaction] if no such transaction exists in the workspace,
/// - or [Error::SqlError] there is some other SQL error.
pub fn delete_transaction(
    workspace_id: WorkspaceId,
    id: TransactionId,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND workspace_id = ?2",
        (id, workspace_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingTransaction);
    }

    Ok(())
}

/// Map a database row to a Transaction.
pub(crate) fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let raw_amount: String = row.get(3)?;
    let amount = Decimal::from_str(&raw_amount).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(error))
    })?;

    let raw_type: String = row.get(4)?;
    let transaction_type = TransactionType::from_str(&raw_type).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(error))
    })?;

    let raw_attachment: Option<String> = row.get(8)?;

    Ok(Transaction {
        id: row.get(0)?,
        workspace_id: WorkspaceId::new(row.get(1)?),
        description: row.get(2)?,
        amount,
        transaction_type,
        category: row.get(5)?,
        date: row.get(6)?,
        added_by: row.get(7)?,
        attachment: raw_attachment.as_deref().and_then(AttachmentRef::parse),
    })
}

// ============================================================================
// TESTS
// ============================================================================
