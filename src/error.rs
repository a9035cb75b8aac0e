// Author: dWallet Labs, Ltd.
// SPDX-License-Identifier: BSD-3-Clause-Clear

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum Error {
    #[error("the following configuration error occurred: {0}")]
    ConfigurationError(#[from] ConfigurationError),
    #[error("the following protocol error occurred: {0}")]
    ProtocolError(#[from] ProtocolError),
    #[error("the following sanity-check error occurred: {0}")]
    SanityCheckError(#[from] SanityCheckError),
    #[error("no discrete log of the decrypted value of {item_id} exists up to {max_dlog}")]
    DiscreteLogBoundExceeded { item_id: String, max_dlog: u32 },
    #[error("an internal error that should never have happened and signifies a bug")]
    InternalError,
}

/// Errors in how the decryption was set up. These are detected before, or while, trustees are
/// configured and abort the whole decryption.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum ConfigurationError {
    #[error("trustee {trustee_id} does not correspond to any guardian")]
    UnknownTrustee { trustee_id: String },
    #[error("trustee {trustee_id} was supplied more than once")]
    DuplicateTrustee { trustee_id: String },
    #[error("the x-coordinate or public key of trustee {trustee_id} does not match its guardian")]
    TrusteeMismatch { trustee_id: String },
    #[error("{present} trustees are present but a quorum of {quorum} is required")]
    InsufficientQuorum { present: usize, quorum: u32 },
    #[error("the missing guardians {missing:?} do not complement the present trustees")]
    PresentSetMismatch { missing: Vec<String> },
    #[error("x-coordinate {x_coordinate} is not in the present set")]
    CoordinateNotPresent { x_coordinate: u32 },
    #[error("x-coordinate {x_coordinate} appears more than once in the present set")]
    DuplicateCoordinate { x_coordinate: u32 },
    #[error("trustee {trustee_id} holds no key share from missing guardian {missing_guardian_id}")]
    MissingKeyShare {
        trustee_id: String,
        missing_guardian_id: String,
    },
    #[error(
        "trustee {trustee_id} could not decrypt its key share from guardian {missing_guardian_id}"
    )]
    UndecryptableKeyShare {
        trustee_id: String,
        missing_guardian_id: String,
    },
    #[error("trustee {trustee_id} was already configured with a different set of missing guardians")]
    MissingGuardiansAlreadySet { trustee_id: String },
    #[error("trustee {trustee_id} was asked to decrypt before its missing guardians were set")]
    TrusteeNotConfigured { trustee_id: String },
    #[error("trustee {trustee_id} does not compensate for missing guardians")]
    CompensationUnsupported { trustee_id: String },
    #[error("{item_id} appears more than once in the ballot or tally")]
    DuplicateItem { item_id: String },
    #[error("ballots {first_ballot_id} and {second_ballot_id} cannot be compared: {reasons}")]
    BallotMismatch {
        first_ballot_id: String,
        second_ballot_id: String,
        reasons: String,
    },
}

/// Errors in the messages exchanged with trustees during the two decryption rounds.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum ProtocolError {
    #[error("trustee {trustee_id} returned {received} results where {expected} were requested")]
    WrongNumberOfResults {
        trustee_id: String,
        expected: usize,
        received: usize,
    },
    #[error("{item_id} has no share from trustee {trustee_id}")]
    MissingShare { item_id: String, trustee_id: String },
    #[error("{item_id} has shares from {received} trustees where {expected} are present")]
    ShareSetMismatch {
        item_id: String,
        expected: usize,
        received: usize,
    },
    #[error("trustee {trustee_id} responded to unknown item {item_id}")]
    UnknownItem { trustee_id: String, item_id: String },
    #[error("{item_id} was never challenged")]
    MissingChallenge { item_id: String },
    #[error("{item_id} has no challenge response from trustee {trustee_id}")]
    MissingResponse { item_id: String, trustee_id: String },
    #[error("the ratio {item_id} was blinded to the identity")]
    DegenerateBlinding { item_id: String },
}

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum SanityCheckError {
    #[error("invalid Params")]
    InvalidParams(),
    #[error("value is not an element of the group")]
    InvalidGroupElement(),
}

pub type Result<T> = std::result::Result<T, Error>;
