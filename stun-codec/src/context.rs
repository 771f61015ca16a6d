use crate::attributes::AttributeType;
use crate::error::{StunError, StunErrorType};
use enumflags2::{bitflags, BitFlags};

/// Order-sensitive attributes recorded while a message is walked or built.
#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ContextFlags {
    /// A FINGERPRINT attribute was seen
    Fingerprint = 1 << 0,
    /// A MESSAGE-INTEGRITY attribute was seen
    Integrity = 1 << 1,
    /// A USE-CANDIDATE attribute was seen
    UseCandidate = 1 << 2,
    /// A DONT-FRAGMENT attribute was seen
    DontFragment = 1 << 3,
}

impl ContextFlags {
    pub(crate) fn from_attribute(attr_type: AttributeType) -> Option<Self> {
        match attr_type {
            AttributeType::FINGERPRINT => Some(ContextFlags::Fingerprint),
            AttributeType::MESSAGE_INTEGRITY => Some(ContextFlags::Integrity),
            AttributeType::USE_CANDIDATE => Some(ContextFlags::UseCandidate),
            AttributeType::DONT_FRAGMENT => Some(ContextFlags::DontFragment),
            _ => None,
        }
    }
}

/// Position of a message in the attribute ordering state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    /// Any attribute may be appended
    Open,
    /// MESSAGE-INTEGRITY was appended, only FINGERPRINT may follow
    IntegrityAdded,
    /// FINGERPRINT was appended, nothing may follow
    FingerprintAdded,
}

/// Cursor over a message buffer, shared by the serializer and the
/// deserializer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StunContext {
    capacity: usize,
    index: usize,
    flags: BitFlags<ContextFlags>,
}

impl StunContext {
    pub(crate) fn new(capacity: usize, index: usize) -> Self {
        Self {
            capacity,
            index,
            flags: BitFlags::empty(),
        }
    }

    /// Total number of bytes the cursor may walk over
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current offset from the start of the message
    pub fn index(&self) -> usize {
        self.index
    }

    /// Bytes between the cursor and the end of the buffer
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.index)
    }

    /// Order-sensitive attributes seen so far
    pub fn flags(&self) -> BitFlags<ContextFlags> {
        self.flags
    }

    /// Returns true if `flag` has been recorded
    pub fn contains(&self, flag: ContextFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Returns the current ordering state
    pub fn order_state(&self) -> OrderState {
        if self.contains(ContextFlags::Fingerprint) {
            OrderState::FingerprintAdded
        } else if self.contains(ContextFlags::Integrity) {
            OrderState::IntegrityAdded
        } else {
            OrderState::Open
        }
    }

    pub(crate) fn advance(&mut self, size: usize) {
        self.index += size;
    }

    pub(crate) fn record(&mut self, attr_type: AttributeType) {
        if let Some(flag) = ContextFlags::from_attribute(attr_type) {
            self.flags |= flag;
        }
    }

    // Error codes and channel numbers are treated like flags: they cannot
    // be protected once the integrity attribute is in place.
    pub(crate) fn check_order(
        &self,
        attr_type: AttributeType,
        barred_after_integrity: bool,
    ) -> Result<(), StunError> {
        let allowed = match self.order_state() {
            OrderState::Open => true,
            OrderState::IntegrityAdded => {
                attr_type == AttributeType::FINGERPRINT && !barred_after_integrity
            }
            OrderState::FingerprintAdded => false,
        };

        allowed.then_some(()).ok_or_else(|| {
            log::trace!("{} rejected in state {:?}", attr_type, self.order_state());
            StunError::new(
                StunErrorType::InvalidAttributeOrder,
                format!(
                    "{} can not be added in state {:?}",
                    attr_type,
                    self.order_state()
                ),
            )
        })
    }
}
