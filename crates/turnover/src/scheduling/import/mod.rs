mod normalizer;
mod parser;

pub use parser::{parse_export, StayTimes};

use super::conflict::ConflictDetector;
use super::domain::{ApartmentId, Conflict, ImportCandidate, ImportedBooking, OwnerId};
use super::error::{RepositoryError, SchedulingError};
use super::store::StoreTx;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read booking export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid booking export CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row} of booking export is invalid: {reason}")]
    InvalidRow { row: usize, reason: String },
    #[error("bookings cannot be imported from `{0}`")]
    UnsupportedSource(String),
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
}

/// Annotates imported bookings with what they would collide with. Never writes.
pub struct ImportReconciler;

impl ImportReconciler {
    /// Returns every candidate, in input order, tagged with its first conflict.
    ///
    /// Existing bookings are checked first, then assignments of the apartment, then
    /// earlier candidates of the same batch. Candidates whose listing maps to no
    /// apartment of the caller stay untagged with no apartment.
    pub fn reconcile(
        tx: &dyn StoreTx,
        caller: &OwnerId,
        candidates: Vec<ImportCandidate>,
    ) -> Result<Vec<ImportedBooking>, SchedulingError> {
        let apartments = tx.apartments_for_owner(caller)?;
        let mut reconciled: Vec<ImportedBooking> = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let apartment_id = apartments
                .iter()
                .find(|apartment| apartment.has_external_ref(candidate.source, &candidate.listing_ref))
                .map(|apartment| apartment.id);

            let conflict = match apartment_id {
                Some(apartment_id) => classify(tx, apartment_id, &candidate, &reconciled)?,
                None => {
                    tracing::warn!(
                        source = candidate.source.label(),
                        listing = %candidate.listing_ref,
                        external_id = %candidate.external_id,
                        "imported booking does not map to a known apartment"
                    );
                    None
                }
            };

            reconciled.push(ImportedBooking {
                candidate,
                apartment_id,
                conflict,
            });
        }

        tracing::info!(
            candidates = reconciled.len(),
            conflicts = reconciled.iter().filter(|item| item.conflict.is_some()).count(),
            "import reconciled"
        );
        Ok(reconciled)
    }
}

fn classify(
    tx: &dyn StoreTx,
    apartment_id: ApartmentId,
    candidate: &ImportCandidate,
    earlier: &[ImportedBooking],
) -> Result<Option<Conflict>, RepositoryError> {
    if let Some(booking) =
        ConflictDetector::bookings_for_apartment(tx, apartment_id, &candidate.range, None)?.first()
    {
        return Ok(Some(Conflict::BookingConflict(booking.id)));
    }

    if let Some(assignment) =
        ConflictDetector::assignments_for_apartment(tx, apartment_id, &candidate.range, None)?
            .first()
    {
        return Ok(Some(Conflict::AssignmentConflict(assignment.id)));
    }

    Ok(earlier
        .iter()
        .position(|item| {
            item.apartment_id == Some(apartment_id) && item.candidate.range.overlaps(&candidate.range)
        })
        .map(Conflict::ImportBookingConflict))
}
