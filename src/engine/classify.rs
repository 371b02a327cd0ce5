//! Outcome classification: existence check + checksum attempt → one terminal state per candidate.

use std::path::Path;

use crate::engine::hashing::{file_exists, hash_file};
use crate::error::ChecksumFailure;
use crate::{Candidate, Digest, ImageId};

/// What looking at a file produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileProbe {
    Missing,
    Unreadable(ChecksumFailure),
    Digest(Digest),
}

/// Stat then hash. A file that vanishes between the two is reported as unreadable.
pub fn probe_file(path: &Path) -> FileProbe {
    if !file_exists(path) {
        return FileProbe::Missing;
    }
    match hash_file(path) {
        Ok(d) => FileProbe::Digest(d),
        Err(e) => FileProbe::Unreadable(e),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Missing,
    Unreadable,
    Mismatch,
}

/// A validation error row waiting to be written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub image_id: ImageId,
    pub kind: FailureKind,
    pub new_digest: Option<Digest>,
    pub message: String,
    pub suggestion: String,
}

/// The single write a candidate produces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// First successful check: insert a record.
    Recorded {
        image_id: ImageId,
        digest: Digest,
        path: String,
    },
    /// Revalidation with an unchanged digest: touch the timestamp only.
    Confirmed { image_id: ImageId },
    /// Insert an error row.
    Failed(Failure),
}

impl Outcome {
    pub fn image_id(&self) -> ImageId {
        match self {
            Outcome::Recorded { image_id, .. } | Outcome::Confirmed { image_id } => *image_id,
            Outcome::Failed(f) => f.image_id,
        }
    }
}

/// Map a candidate and its probe onto the outcome table.
pub fn classify(candidate: &Candidate, probe: FileProbe) -> Outcome {
    let image_id = candidate.image_id();
    let path = candidate.path();
    let shown = path.display();
    match (candidate, probe) {
        (Candidate::New(_), FileProbe::Missing) => Outcome::Failed(Failure {
            image_id,
            kind: FailureKind::Missing,
            new_digest: None,
            message: "Initial validation did not find the file where the catalog places it."
                .to_string(),
            suggestion: format!(
                "Catalog path is ({shown}). The file may be on offline media (not supported) or moved outside the catalog. \
                 Locate it with the catalog's missing-file tools, then ignore this error so it is picked up again."
            ),
        }),
        (Candidate::Due(due), FileProbe::Missing) => Outcome::Failed(Failure {
            image_id,
            kind: FailureKind::Missing,
            new_digest: None,
            message: format!(
                "Revalidation did not find the file at the catalog location ({shown})."
            ),
            suggestion: format!(
                "Check the file was not moved outside the catalog; last seen at ({}). Offline media is not supported. \
                 Ignore this error to revalidate it later (it cannot be accepted).",
                due.prior_path.as_deref().unwrap_or("")
            ),
        }),
        (Candidate::New(_), FileProbe::Unreadable(e)) => Outcome::Failed(Failure {
            image_id,
            kind: FailureKind::Unreadable,
            new_digest: None,
            message: "Initial validation found the file but could not read it for a checksum."
                .to_string(),
            suggestion: format!(
                "{e}; possible disk error or damaged file structure. Fix the cause, then ignore this error to validate again."
            ),
        }),
        (Candidate::Due(_), FileProbe::Unreadable(e)) => Outcome::Failed(Failure {
            image_id,
            kind: FailureKind::Unreadable,
            new_digest: None,
            message: "Revalidation found the file but reading it for a checksum failed.".to_string(),
            suggestion: format!(
                "{e}; possible disk error or damaged file structure. Make sure the file opens, \
                 then ignore this error to try again."
            ),
        }),
        (Candidate::New(_), FileProbe::Digest(digest)) => Outcome::Recorded {
            image_id,
            digest,
            path: path.to_string_lossy().into_owned(),
        },
        (Candidate::Due(due), FileProbe::Digest(digest)) => {
            if digest.matches_stored(&due.prior_digest) {
                Outcome::Confirmed { image_id }
            } else {
                Outcome::Failed(Failure {
                    image_id,
                    kind: FailureKind::Mismatch,
                    new_digest: Some(digest),
                    message: "Revalidation found a checksum mismatch.".to_string(),
                    suggestion: "The file changed, possibly through metadata writes or direct edits. \
                                 Accept if the change was intended; ignore to recover the original and check again."
                        .to_string(),
                })
            }
        }
    }
}

/// Probe the candidate's file and classify it. Never fails; every candidate yields an outcome.
pub fn evaluate(candidate: &Candidate) -> Outcome {
    let probe = probe_file(&candidate.path());
    classify(candidate, probe)
}
