/// Perfect-negotiation flags of one peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NegotiationState {
    /// An offer is being created and applied locally.
    pub making_offer: bool,
    /// The last remote offer collided with ours and was ignored.
    pub ignore_offer: bool,
    /// A remote answer is being applied.
    pub is_setting_remote_answer_pending: bool,
    /// Fixed at construction: `local < remote`.
    pub polite: bool,
}

impl NegotiationState {
    pub fn new(polite: bool) -> Self {
        Self {
            polite,
            ..Default::default()
        }
    }
}
