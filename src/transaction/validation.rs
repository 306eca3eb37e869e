//! Business rules a transaction must satisfy before it is written.

use time::OffsetDateTime;

use crate::{
    Error,
    transaction::{NewTransaction, TransactionRequest},
};

impl TransactionRequest {
    /// Check the request against the rules for a single transaction,
    /// treating `now` as the current time.
    ///
    /// The per-customer volume cap needs the database and is checked by the
    /// store when the transaction is written.
    ///
    /// # Errors
    /// Returns an [Error::InvalidArgument] describing the first rule that failed.
    pub fn validate(self, now: OffsetDateTime) -> Result<NewTransaction, Error> {
        validate_date(self.date, now)?;
        validate_amount(self.amount)?;
        validate_not_blank("customer", &self.customer)?;
        validate_not_blank("merchant", &self.merchant)?;

        Ok(NewTransaction {
            customer: self.customer,
            amount: self.amount,
            merchant: self.merchant,
            date: self.date,
        })
    }
}

/// Transactions must have a positive amount.
pub fn validate_amount(amount: i64) -> Result<(), Error> {
    if amount <= 0 {
        return Err(Error::InvalidArgument(
            "The amount must be greater than zero".to_owned(),
        ));
    }

    Ok(())
}

/// Transactions record events that have already happened, so `date` may not be after `now`.
pub fn validate_date(date: OffsetDateTime, now: OffsetDateTime) -> Result<(), Error> {
    if date > now {
        return Err(Error::InvalidArgument(
            "The date cannot be later than the current date".to_owned(),
        ));
    }

    Ok(())
}

/// Text fields such as the customer and merchant must contain more than whitespace.
pub fn validate_not_blank(field_name: &str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::InvalidArgument(format!(
            "The {field_name} cannot be empty"
        )));
    }

    Ok(())
}

/// A customer with `existing_count` stored transactions may not add another
/// once they have reached `limit`.
pub fn check_volume_cap(existing_count: u32, limit: u32) -> Result<(), Error> {
    if existing_count >= limit {
        return Err(Error::InvalidArgument(format!(
            "No more than {limit} transactions can be recorded"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime, macros::datetime};

    use crate::{
        Error,
        transaction::{NewTransaction, TransactionRequest},
    };

    use super::{check_volume_cap, validate_amount, validate_date, validate_not_blank};

    fn valid_request(now: OffsetDateTime) -> TransactionRequest {
        TransactionRequest {
            customer: "1".to_owned(),
            amount: 1000,
            merchant: "StoreA".to_owned(),
            date: now,
        }
    }

    #[test]
    fn amount_must_be_positive() {
        assert!(validate_amount(0).is_err());
        assert!(validate_amount(-5).is_err());
        assert_eq!(validate_amount(1), Ok(()));
    }

    #[test]
    fn date_may_not_be_in_future() {
        let now = datetime!(2025-01-13 12:00 UTC);

        assert_eq!(
            validate_date(now + Duration::seconds(1), now),
            Err(Error::InvalidArgument(
                "The date cannot be later than the current date".to_owned()
            ))
        );
        assert_eq!(validate_date(now, now), Ok(()));
        assert_eq!(validate_date(now - Duration::days(30), now), Ok(()));
    }

    #[test]
    fn date_comparison_respects_offsets() {
        let now = datetime!(2025-01-13 12:00 UTC);

        // Same instant as `now`, written in a different offset.
        assert_eq!(validate_date(datetime!(2025-01-13 09:00 -03:00), now), Ok(()));
        assert!(validate_date(datetime!(2025-01-13 09:01 -03:00), now).is_err());
    }

    #[test]
    fn text_fields_must_not_be_blank() {
        assert_eq!(
            validate_not_blank("merchant", "  "),
            Err(Error::InvalidArgument("The merchant cannot be empty".to_owned()))
        );
        assert_eq!(validate_not_blank("merchant", "StoreA"), Ok(()));
    }

    #[test]
    fn volume_cap_rejects_at_limit() {
        assert_eq!(check_volume_cap(99, 100), Ok(()));
        assert_eq!(
            check_volume_cap(100, 100),
            Err(Error::InvalidArgument(
                "No more than 100 transactions can be recorded".to_owned()
            ))
        );
    }

    #[test]
    fn valid_request_becomes_new_transaction() {
        let now = datetime!(2025-01-13 12:00 UTC);

        let result = valid_request(now).validate(now);

        assert_eq!(
            result,
            Ok(NewTransaction {
                customer: "1".to_owned(),
                amount: 1000,
                merchant: "StoreA".to_owned(),
                date: now,
            })
        );
    }

    #[test]
    fn request_reports_date_before_amount() {
        let now = datetime!(2025-01-13 12:00 UTC);
        let request = TransactionRequest {
            amount: 0,
            date: now + Duration::hours(1),
            ..valid_request(now)
        };

        let result = request.validate(now);

        assert_eq!(
            result,
            Err(Error::InvalidArgument(
                "The date cannot be later than the current date".to_owned()
            ))
        );
    }

    #[test]
    fn request_with_empty_customer_is_rejected() {
        let now = datetime!(2025-01-13 12:00 UTC);
        let request = TransactionRequest {
            customer: String::new(),
            ..valid_request(now)
        };

        assert!(matches!(
            request.validate(now),
            Err(Error::InvalidArgument(_))
        ));
    }
}
