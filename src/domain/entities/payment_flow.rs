use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Progress of one outbound gateway payment.
///
/// `Built -> Signed -> Redirected -> {Returned, CallbackReceived, Expired}`,
/// and a returned or called-back payment ends `Verified` or `Rejected`
/// depending on the signature check. Transitions are driven by gateway
/// traffic; this type only guards their order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum PaymentFlowState {
    Built,
    Signed,
    Redirected,
    Returned,
    CallbackReceived,
    Expired,
    Verified,
    Rejected,
}

impl PaymentFlowState {
    /// Valid transitions from this state
    pub fn valid_transitions(&self) -> &'static [PaymentFlowState] {
        use PaymentFlowState::*;
        match self {
            Built => &[Signed],
            Signed => &[Redirected],
            Redirected => &[Returned, CallbackReceived, Expired],
            Returned | CallbackReceived => &[Verified, Rejected],
            Expired | Verified | Rejected => &[],
        }
    }

    pub fn can_transition_to(&self, next: PaymentFlowState) -> bool {
        self.valid_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Outcome of a signature check on a returned or called-back payment.
    pub fn verification_outcome(signature_valid: bool) -> PaymentFlowState {
        if signature_valid {
            PaymentFlowState::Verified
        } else {
            PaymentFlowState::Rejected
        }
    }
}

/// Tracks a single payment through [`PaymentFlowState`], refusing
/// out-of-order transitions.
///
/// This is a per-request guard and transition log, not stored state. The
/// persisted order and transaction statuses decide what a callback may do;
/// callbacks resume here at `Redirected`. `Expired` is never entered by a
/// request, since an unpaid order simply stays `PENDING` in the database.
#[derive(Debug, Clone)]
pub struct PaymentFlow {
    reference: String,
    state: PaymentFlowState,
}

impl PaymentFlow {
    pub fn built(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            state: PaymentFlowState::Built,
        }
    }

    /// Resume tracking at a known state, e.g. when a callback arrives for a
    /// redirect issued by an earlier request.
    pub fn resume(reference: impl Into<String>, state: PaymentFlowState) -> Self {
        Self {
            reference: reference.into(),
            state,
        }
    }

    pub fn state(&self) -> PaymentFlowState {
        self.state
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn advance(&mut self, next: PaymentFlowState) -> Result<PaymentFlowState, String> {
        if !self.state.can_transition_to(next) {
            return Err(format!(
                "payment {}: illegal transition {} -> {}",
                self.reference, self.state, next
            ));
        }
        tracing::debug!(
            reference = %self.reference,
            from = %self.state,
            to = %next,
            "Payment flow transition"
        );
        self.state = next;
        Ok(next)
    }
}
