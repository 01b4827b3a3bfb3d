use std::fmt;

use thiserror::Error;

use crate::constants::*;

/// A single record of the table. Text columns are stored null padded and are
/// not required to carry a terminating null byte.
#[derive(Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: [u8; USERNAME_SIZE],
    pub email: [u8; EMAIL_SIZE],
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("{column} is {len} bytes, at most {max} fit")]
    TooLong {
        column: &'static str,
        len: usize,
        max: usize,
    },
}

impl Row {
    pub fn new(id: u32, username: &str, email: &str) -> Result<Self, RowError> {
        Ok(Row {
            id,
            username: pad_column("username", username.as_bytes())?,
            email: pad_column("email", email.as_bytes())?,
        })
    }

    /// Writes the row into a cell value slot. Lengths are fixed by the type so
    /// there is nothing to fail on.
    pub fn serialize(&self, buf: &mut [u8; ROW_SIZE]) {
        buf[ID_OFFSET..USERNAME_OFFSET].copy_from_slice(&self.id.to_le_bytes());
        buf[USERNAME_OFFSET..EMAIL_OFFSET].copy_from_slice(&self.username);
        buf[EMAIL_OFFSET..ROW_SIZE].copy_from_slice(&self.email);
    }

    pub fn deserialize(buf: &[u8; ROW_SIZE]) -> Self {
        let mut id = [0u8; ID_SIZE];
        let mut username = [0u8; USERNAME_SIZE];
        let mut email = [0u8; EMAIL_SIZE];

        id.copy_from_slice(&buf[ID_OFFSET..USERNAME_OFFSET]);
        username.copy_from_slice(&buf[USERNAME_OFFSET..EMAIL_OFFSET]);
        email.copy_from_slice(&buf[EMAIL_OFFSET..ROW_SIZE]);

        Row {
            id: u32::from_le_bytes(id),
            username,
            email,
        }
    }

    pub fn username(&self) -> String {
        column_text(&self.username)
    }

    pub fn email(&self) -> String {
        column_text(&self.email)
    }
}

fn pad_column<const N: usize>(column: &'static str, bytes: &[u8]) -> Result<[u8; N], RowError> {
    if bytes.len() > N {
        return Err(RowError::TooLong {
            column,
            len: bytes.len(),
            max: N,
        });
    }
    let mut padded = [0u8; N];
    padded[..bytes.len()].copy_from_slice(bytes);
    Ok(padded)
}

fn column_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username(), self.email())
    }
}

// the padded arrays make the derived output unreadable
impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("id", &self.id)
            .field("username", &self.username())
            .field("email", &self.email())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn serializes_at_fixed_offsets() {
        let row = Row::new(0x0102_0304, "ab", "c@d").unwrap();
        let mut buf = [0xffu8; ROW_SIZE];
        row.serialize(&mut buf);

        assert_eq!(&buf[..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&buf[USERNAME_OFFSET..USERNAME_OFFSET + 3], b"ab\0");
        assert!(buf[USERNAME_OFFSET + 2..EMAIL_OFFSET].iter().all(|b| *b == 0));
        assert_eq!(&buf[EMAIL_OFFSET..EMAIL_OFFSET + 3], b"c@d");
        assert!(buf[EMAIL_OFFSET + 3..].iter().all(|b| *b == 0));
    }

    #[test]
    fn full_width_columns_have_no_terminator() {
        let username = "u".repeat(COLUMN_USERNAME_SIZE);
        let email = "e".repeat(COLUMN_EMAIL_SIZE);
        let row = Row::new(7, &username, &email).unwrap();

        let mut buf = [0u8; ROW_SIZE];
        row.serialize(&mut buf);
        let back = Row::deserialize(&buf);

        assert_eq!(back.username(), username);
        assert_eq!(back.email(), email);
    }

    #[test]
    fn rejects_oversized_columns() {
        let username = "u".repeat(COLUMN_USERNAME_SIZE + 1);
        assert_eq!(
            Row::new(1, &username, "a@b"),
            Err(RowError::TooLong {
                column: "username",
                len: 33,
                max: 32
            })
        );

        let email = "e".repeat(COLUMN_EMAIL_SIZE + 1);
        assert!(matches!(
            Row::new(1, "user", &email),
            Err(RowError::TooLong { column: "email", .. })
        ));
    }

    #[test]
    fn displays_like_the_repl_prints_it() {
        let row = Row::new(1, "user1", "person1@example.com").unwrap();
        assert_eq!(row.to_string(), "(1, user1, person1@example.com)");
    }

    proptest! {
        #[test]
        fn deserialize_inverts_serialize(
            id in any::<u32>(),
            username in "[a-zA-Z0-9_]{0,32}",
            email in "[a-z0-9@.]{0,255}",
        ) {
            let row = Row::new(id, &username, &email).unwrap();
            let mut buf = [0u8; ROW_SIZE];
            row.serialize(&mut buf);
            prop_assert_eq!(Row::deserialize(&buf), row);
        }
    }
}
