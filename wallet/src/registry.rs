use std::collections::HashMap;
use std::sync::Arc;

use crate::error::WalletError;
use crate::reservation::{Reservation, ReservationTerms};

/// Reservations in flight, by id. Owned by the coordinator.
pub struct ReservationRegistry {
    // ids are never reused within the process
    next_id: u64,
    limit: usize,
    reservations: HashMap<u64, Arc<Reservation>>,
}

impl ReservationRegistry {
    pub fn new(limit: usize) -> Self {
        ReservationRegistry {
            next_id: 1,
            limit,
            reservations: HashMap::new(),
        }
    }

    pub fn check_limit(&self) -> Result<(), WalletError> {
        if self.reservations.len() >= self.limit {
            return Err(WalletError::ReservationLimit(self.limit));
        }
        Ok(())
    }

    /// Creates and registers a new reservation in `Created` state.
    pub fn register(&mut self, terms: ReservationTerms) -> Result<Arc<Reservation>, WalletError> {
        self.check_limit()?;

        let id = self.next_id;
        self.next_id += 1;

        let reservation = Arc::new(Reservation::new(id, terms));
        self.reservations.insert(id, reservation.clone());
        Ok(reservation)
    }

    pub fn get(&self, id: u64) -> Option<&Arc<Reservation>> {
        self.reservations.get(&id)
    }

    pub fn remove(&mut self, id: u64) -> Option<Arc<Reservation>> {
        self.reservations.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::ReservationRegistry;
    use crate::error::WalletError;
    use crate::reservation::{FundingType, ReservationTerms, ReservationState};
    use wire::{Satoshi, SatoshiPerVByte};

    fn terms() -> ReservationTerms {
        ReservationTerms::new(FundingType::SingleFunder, Satoshi::from(100_000), Satoshi::from(0), SatoshiPerVByte::from(1))
    }

    #[test]
    fn ids_are_not_reused() {
        let mut registry = ReservationRegistry::new(8);
        let a = registry.register(terms()).unwrap();
        let b = registry.register(terms()).unwrap();
        assert_eq!((a.id(), b.id()), (1, 2));
        assert_eq!(a.state(), ReservationState::Created);

        assert!(registry.remove(2).is_some());
        assert!(registry.remove(2).is_none());
        assert_eq!(registry.register(terms()).unwrap().id(), 3);
        assert_eq!(registry.len(), 2);
        assert!(registry.get(2).is_none());
        assert_eq!(registry.get(3).map(|r| r.id()), Some(3));
    }

    #[test]
    fn pending_limit() {
        let mut registry = ReservationRegistry::new(1);
        registry.register(terms()).unwrap();
        match registry.register(terms()) {
            Err(WalletError::ReservationLimit(1)) => (),
            other => panic!("unexpected {:?}", other.map(|r| r.id())),
        }

        registry.remove(1);
        assert!(registry.is_empty());
        assert_eq!(registry.register(terms()).unwrap().id(), 2);
    }
}
