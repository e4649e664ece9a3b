//! Change and tombstone notifications for table observers.
//!
//! A record with an absent value for an existing key is a tombstone: a
//! logical delete. The mapping from raw observation to notification is
//! total and needs no state beyond its three inputs.

/// Kind of change observed on a keyed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// First value seen for the key.
    Insert,
    /// A value replacing a known previous value.
    Update,
    /// A tombstone: the key's value is gone.
    Delete,
}

/// One observed change on a table's underlying log.
///
/// Invariant: `change_type == Delete` exactly when `value` is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotification<T> {
    /// The change kind.
    pub change_type: ChangeType,
    /// Wire key of the affected record.
    pub key: String,
    /// Current value; absent for tombstones.
    pub value: Option<T>,
    /// Previously known value for the key, if any.
    pub previous: Option<T>,
    /// Record timestamp, epoch milliseconds.
    pub timestamp: i64,
}

/// Derive a notification from a raw observation.
///
/// Absent value ⇒ [`ChangeType::Delete`]; present value with no known
/// previous value ⇒ [`ChangeType::Insert`]; present value with a known
/// previous value ⇒ [`ChangeType::Update`].
#[must_use]
pub fn to_notification<T>(
    key: impl Into<String>,
    value: Option<T>,
    previous: Option<T>,
    timestamp: i64,
) -> ChangeNotification<T> {
    let change_type = match (&value, &previous) {
        (None, _) => ChangeType::Delete,
        (Some(_), None) => ChangeType::Insert,
        (Some(_), Some(_)) => ChangeType::Update,
    };
    ChangeNotification {
        change_type,
        key: key.into(),
        value,
        previous,
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_value_is_delete() {
        let n = to_notification::<i32>("k", None, Some(7), 100);
        assert_eq!(n.change_type, ChangeType::Delete);
        assert_eq!(n.previous, Some(7));
        assert_eq!(n.value, None);
    }

    #[test]
    fn absent_value_without_previous_is_still_delete() {
        let n = to_notification::<i32>("k", None, None, 100);
        assert_eq!(n.change_type, ChangeType::Delete);
    }

    #[test]
    fn first_value_is_insert() {
        let n = to_notification("k", Some(1), None, 5);
        assert_eq!(n.change_type, ChangeType::Insert);
        assert_eq!(n.value, Some(1));
        assert_eq!(n.timestamp, 5);
    }

    #[test]
    fn replacement_is_update() {
        let n = to_notification("k", Some(2), Some(1), 6);
        assert_eq!(n.change_type, ChangeType::Update);
        assert_eq!(n.previous, Some(1));
    }
}
