// src/services/credits.rs
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::error::ChatError;

/// Pre-flight credit floor check. Optimistic: nothing is locked or reserved,
/// so the balance may drop below the floor by the time the debit lands.
pub fn check_credits(balance: Decimal, minimum: Decimal) -> Result<(), ChatError> {
    if balance < minimum {
        return Err(ChatError::InsufficientCredits);
    }
    Ok(())
}

/// Writes the post-charge balance. The balance only ever decreases here;
/// top-ups belong to another system.
pub async fn debit_credits(
    pool: &PgPool,
    user_id: &str,
    balance: Decimal,
    credits_used: Decimal,
) -> Result<Decimal, ChatError> {
    let new_balance = balance - credits_used;

    sqlx::query("UPDATE user_chat_credits SET credits = $1 WHERE user_id = $2")
        .bind(new_balance)
        .bind(user_id)
        .execute(pool)
        .await?;

    tracing::debug!("💰 debited {} credits from {} (balance {} -> {})", credits_used, user_id, balance, new_balance);

    Ok(new_balance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_equal_to_minimum_passes() {
        let minimum = Decimal::new(5, 2);
        assert!(check_credits(minimum, minimum).is_ok());
    }

    #[test]
    fn test_balance_a_hair_below_minimum_fails() {
        let minimum = Decimal::new(5, 2);
        let balance = minimum - Decimal::new(1, 8);
        let err = check_credits(balance, minimum).unwrap_err();
        assert!(matches!(err, ChatError::InsufficientCredits));
    }

    #[test]
    fn test_zero_floor_always_passes() {
        assert!(check_credits(Decimal::ZERO, Decimal::ZERO).is_ok());
    }
}
