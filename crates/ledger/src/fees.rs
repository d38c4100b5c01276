use num_traits::ToPrimitive;
use types::errors::LedgerError;

/// Version, locktime, counts and segwit marker, rounded up.
pub const TX_OVERHEAD_VBYTES: u32 = 11;
/// One P2WPKH input.
pub const INPUT_VBYTES: u32 = 68;
/// One P2WPKH output.
pub const OUTPUT_VBYTES: u32 = 31;

/// Payee plus change.
pub const WITHDRAWAL_OUTPUTS: u32 = 2;

pub fn validate_fee_rate(rate: f64) -> Result<f64, LedgerError> {
    if rate.is_finite() && rate >= 0.0 {
        Ok(rate)
    } else {
        Err(LedgerError::FeeEstimationFailed(format!(
            "unusable fee rate {rate}"
        )))
    }
}

pub fn fee_for_vbytes(rate: f64, vbytes: u32) -> Result<u64, LedgerError> {
    (rate * f64::from(vbytes))
        .ceil()
        .to_u64()
        .ok_or_else(|| LedgerError::FeeEstimationFailed(format!("fee overflow at {rate} sat/vB")))
}

/// Marginal cost of adding one input to a withdrawal.
pub fn input_cost(rate: f64) -> Result<u64, LedgerError> {
    fee_for_vbytes(rate, INPUT_VBYTES)
}

/// Cost of a withdrawal transaction before any inputs are added.
pub fn base_fee(rate: f64) -> Result<u64, LedgerError> {
    fee_for_vbytes(rate, TX_OVERHEAD_VBYTES + WITHDRAWAL_OUTPUTS * OUTPUT_VBYTES)
}

/// Fee for a withdrawal spending `inputs` inputs.
pub fn withdrawal_fee(rate: f64, inputs: usize) -> Result<u64, LedgerError> {
    let inputs = u32::try_from(inputs)
        .map_err(|_| LedgerError::FeeEstimationFailed(format!("{inputs} inputs")))?;
    let vbytes = inputs
        .checked_mul(INPUT_VBYTES)
        .and_then(|v| v.checked_add(TX_OVERHEAD_VBYTES + WITHDRAWAL_OUTPUTS * OUTPUT_VBYTES))
        .ok_or_else(|| LedgerError::FeeEstimationFailed(format!("{inputs} inputs")))?;
    fee_for_vbytes(rate, vbytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn fees_round_up() {
        assert_eq!(fee_for_vbytes(1.0, 68).unwrap(), 68);
        assert_eq!(fee_for_vbytes(1.5, 11).unwrap(), 17);
        assert_eq!(base_fee(2.0).unwrap(), 146);
        assert_eq!(withdrawal_fee(2.0, 3).unwrap(), 146 + 3 * 136);
    }

    #[test]
    fn rejects_unusable_rates() {
        assert_matches!(validate_fee_rate(f64::NAN), Err(LedgerError::FeeEstimationFailed(_)));
        assert_matches!(validate_fee_rate(-1.0), Err(LedgerError::FeeEstimationFailed(_)));
        assert!(validate_fee_rate(0.0).is_ok());
    }
}
