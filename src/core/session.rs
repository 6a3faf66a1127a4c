use crate::models::{RelaxationResult, SearchCriteria};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic request counter shared between a caller and its in-flight resolutions
///
/// Each request takes a fresh generation; a response is only applied if its
/// generation is still the latest one issued.
#[derive(Debug, Default)]
pub struct RequestGenerations {
    latest: AtomicU64,
}

impl RequestGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new generation, superseding every earlier one
    pub fn next(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.latest() == generation
    }
}

/// Steps of the onboarding wizard, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    PropertyType,
    Budget,
    Bedrooms,
    Neighborhoods,
    MustHaves,
    Discount,
    Results,
}

impl OnboardingStep {
    pub fn next(self) -> Self {
        match self {
            OnboardingStep::PropertyType => OnboardingStep::Budget,
            OnboardingStep::Budget => OnboardingStep::Bedrooms,
            OnboardingStep::Bedrooms => OnboardingStep::Neighborhoods,
            OnboardingStep::Neighborhoods => OnboardingStep::MustHaves,
            OnboardingStep::MustHaves => OnboardingStep::Discount,
            OnboardingStep::Discount | OnboardingStep::Results => OnboardingStep::Results,
        }
    }

    pub fn previous(self) -> Self {
        match self {
            OnboardingStep::PropertyType | OnboardingStep::Budget => OnboardingStep::PropertyType,
            OnboardingStep::Bedrooms => OnboardingStep::Budget,
            OnboardingStep::Neighborhoods => OnboardingStep::Bedrooms,
            OnboardingStep::MustHaves => OnboardingStep::Neighborhoods,
            OnboardingStep::Discount => OnboardingStep::MustHaves,
            OnboardingStep::Results => OnboardingStep::Discount,
        }
    }
}

/// Transitions accepted by [`SearchSession::update`]
#[derive(Debug, Clone)]
pub enum SessionEvent {
    CriteriaEdited(SearchCriteria),
    Advance,
    Back,
    CountReceived {
        generation: u64,
        result: RelaxationResult,
    },
}

/// Resolution the caller should run on behalf of the session
#[derive(Debug, Clone, PartialEq)]
pub struct CountRequest {
    pub generation: u64,
    pub criteria: SearchCriteria,
    pub allow_relaxation: bool,
}

/// Wizard state: current step, criteria, the latest live count and the final
/// resolution. Every change goes through `update`; responses tagged with a
/// superseded generation are dropped.
#[derive(Debug, Clone)]
pub struct SearchSession {
    current_step: OnboardingStep,
    criteria: SearchCriteria,
    last_live_count: Option<RelaxationResult>,
    final_result: Option<RelaxationResult>,
    generation: u64,
}

impl SearchSession {
    pub fn new(criteria: SearchCriteria) -> Self {
        Self {
            current_step: OnboardingStep::PropertyType,
            criteria,
            last_live_count: None,
            final_result: None,
            generation: 0,
        }
    }

    pub fn current_step(&self) -> OnboardingStep {
        self.current_step
    }

    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    pub fn last_live_count(&self) -> Option<&RelaxationResult> {
        self.last_live_count.as_ref()
    }

    pub fn final_result(&self) -> Option<&RelaxationResult> {
        self.final_result.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn request(&mut self, allow_relaxation: bool) -> CountRequest {
        self.generation += 1;
        CountRequest {
            generation: self.generation,
            criteria: self.criteria.clone(),
            allow_relaxation,
        }
    }

    /// Apply one transition, returning the resolution to run if any
    pub fn update(&mut self, event: SessionEvent) -> Option<CountRequest> {
        match event {
            SessionEvent::CriteriaEdited(criteria) => {
                if criteria == self.criteria {
                    return None;
                }
                self.criteria = criteria;
                // on the results page an edit re-runs the full fallback chain
                let full = self.current_step == OnboardingStep::Results;
                if full {
                    self.final_result = None;
                }
                Some(self.request(full))
            }
            SessionEvent::Advance => match self.current_step {
                OnboardingStep::Results => None,
                OnboardingStep::Discount => {
                    self.current_step = OnboardingStep::Results;
                    Some(self.request(true))
                }
                step => {
                    self.current_step = step.next();
                    None
                }
            },
            SessionEvent::Back => {
                if self.current_step == OnboardingStep::Results {
                    self.final_result = None;
                    // invalidate a full resolution still in flight
                    self.generation += 1;
                }
                self.current_step = self.current_step.previous();
                None
            }
            SessionEvent::CountReceived { generation, result } => {
                if generation != self.generation {
                    tracing::debug!(
                        "Dropping stale count response (generation {}, current {})",
                        generation,
                        self.generation
                    );
                    return None;
                }
                if self.current_step == OnboardingStep::Results {
                    self.final_result = Some(result);
                } else {
                    self.last_live_count = Some(result);
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PropertyType;

    fn advance_to_discount(session: &mut SearchSession) {
        while session.current_step() != OnboardingStep::Discount {
            assert!(session.update(SessionEvent::Advance).is_none());
        }
    }

    #[test]
    fn test_generations_are_monotonic() {
        let generations = RequestGenerations::new();
        let first = generations.next();
        let second = generations.next();
        assert!(second > first);
        assert!(!generations.is_current(first));
        assert!(generations.is_current(second));
    }

    #[test]
    fn test_edit_emits_live_count_request() {
        let mut session = SearchSession::new(SearchCriteria::new(PropertyType::Rent));
        let request = session
            .update(SessionEvent::CriteriaEdited(
                SearchCriteria::new(PropertyType::Rent).with_bedrooms(1),
            ))
            .unwrap();

        assert_eq!(request.generation, 1);
        assert!(!request.allow_relaxation);
        assert_eq!(request.criteria.bedrooms, Some(1));
    }

    #[test]
    fn test_unchanged_criteria_emit_nothing() {
        let criteria = SearchCriteria::new(PropertyType::Buy);
        let mut session = SearchSession::new(criteria.clone());
        assert!(session.update(SessionEvent::CriteriaEdited(criteria)).is_none());
        assert_eq!(session.generation(), 0);
    }

    #[test]
    fn test_stale_responses_are_dropped() {
        let mut session = SearchSession::new(SearchCriteria::new(PropertyType::Rent));
        let first = session
            .update(SessionEvent::CriteriaEdited(
                SearchCriteria::new(PropertyType::Rent).with_bedrooms(1),
            ))
            .unwrap();
        let second = session
            .update(SessionEvent::CriteriaEdited(
                SearchCriteria::new(PropertyType::Rent).with_bedrooms(2),
            ))
            .unwrap();

        // the slower first response lands last and must not win
        session.update(SessionEvent::CountReceived {
            generation: second.generation,
            result: RelaxationResult::direct(4),
        });
        session.update(SessionEvent::CountReceived {
            generation: first.generation,
            result: RelaxationResult::direct(9),
        });

        assert_eq!(session.last_live_count(), Some(&RelaxationResult::direct(4)));
    }

    #[test]
    fn test_finishing_runs_full_resolution() {
        let mut session = SearchSession::new(SearchCriteria::new(PropertyType::Rent));
        advance_to_discount(&mut session);

        let request = session.update(SessionEvent::Advance).unwrap();
        assert!(request.allow_relaxation);
        assert_eq!(session.current_step(), OnboardingStep::Results);

        session.update(SessionEvent::CountReceived {
            generation: request.generation,
            result: RelaxationResult::empty(),
        });
        assert_eq!(session.final_result(), Some(&RelaxationResult::empty()));
        assert!(session.last_live_count().is_none());
    }

    #[test]
    fn test_back_from_results_discards_in_flight() {
        let mut session = SearchSession::new(SearchCriteria::new(PropertyType::Rent));
        advance_to_discount(&mut session);
        let request = session.update(SessionEvent::Advance).unwrap();

        session.update(SessionEvent::Back);
        assert_eq!(session.current_step(), OnboardingStep::Discount);

        session.update(SessionEvent::CountReceived {
            generation: request.generation,
            result: RelaxationResult::direct(3),
        });
        assert!(session.final_result().is_none());
        assert!(session.last_live_count().is_none());
    }
}
