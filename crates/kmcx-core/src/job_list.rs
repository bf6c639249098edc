use crate::constants::MAX_JOB_COUNT;
use crate::errors::DomainError;
use crate::job::{JobConfiguration, JobId};
use crate::observer::{Observers, SubscriptionId};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobListEvent {
    Changed { has_valid_jobs: bool },
    SelectionChanged(Option<JobId>),
}

/// Ordered collection of jobs awaiting submission.
///
/// New IDs are always one past the largest ID in the list, so IDs are
/// unique and never reused while a larger one is present.
#[derive(Debug)]
pub struct JobList {
    entries: Vec<JobConfiguration>,
    selected: Option<JobId>,
    max_count: usize,
    observers: Observers<JobListEvent>,
}

impl Default for JobList {
    fn default() -> Self {
        Self::new(MAX_JOB_COUNT)
    }
}

impl JobList {
    pub fn new(max_count: usize) -> Self {
        Self {
            entries: Vec::new(),
            selected: None,
            max_count: max_count.min(MAX_JOB_COUNT),
            observers: Observers::default(),
        }
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_valid_jobs(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobConfiguration> {
        self.entries.iter()
    }

    pub fn ids(&self) -> Vec<JobId> {
        self.entries.iter().map(JobConfiguration::id).collect()
    }

    pub fn get(&self, id: JobId) -> Option<&JobConfiguration> {
        self.entries.iter().find(|job| job.id() == id)
    }

    pub fn selected_id(&self) -> Option<JobId> {
        self.selected
    }

    pub fn selected(&self) -> Option<&JobConfiguration> {
        self.selected.and_then(|id| self.get(id))
    }

    /// Deep copies of every job, in list order, for handing to a worker.
    pub fn to_batch(&self) -> Vec<JobConfiguration> {
        self.entries.iter().map(JobConfiguration::get_copy).collect()
    }

    fn next_raw_id(&self) -> u32 {
        self.entries
            .iter()
            .map(|job| job.id().get())
            .max()
            .unwrap_or(0)
            + 1
    }

    fn position(&self, id: JobId) -> Result<usize, DomainError> {
        self.entries
            .iter()
            .position(|job| job.id() == id)
            .ok_or(DomainError::JobNotFound(id))
    }

    fn capacity_error(&self) -> DomainError {
        DomainError::CapacityReached {
            count: self.entries.len(),
            max: self.max_count,
        }
    }

    /// Appends a copy of `draft` under a fresh ID and selects it.
    pub fn add(&mut self, draft: &JobConfiguration) -> Result<JobId, DomainError> {
        if self.entries.len() >= self.max_count {
            return Err(self.capacity_error());
        }
        let id = JobId::new(self.next_raw_id())?;
        self.entries.push(draft.with_id(id));
        tracing::debug!("Added job {}", id);
        self.notify_changed();
        self.set_selection(Some(id));
        Ok(id)
    }

    /// Appends `count` copies of job `source` with consecutive fresh IDs and
    /// selects the last one. Nothing changes if any copy would not fit.
    pub fn duplicate(&mut self, source: JobId, count: usize) -> Result<Vec<JobId>, DomainError> {
        let index = self.position(source)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        if self.entries.len() + count >= self.max_count {
            return Err(self.capacity_error());
        }

        let first = self.next_raw_id();
        let last = u32::try_from(count)
            .ok()
            .and_then(|n| first.checked_add(n - 1))
            .unwrap_or(u32::MAX);
        JobId::new(last)?;

        let template = self.entries[index].get_copy();
        let mut ids = Vec::with_capacity(count);
        for raw in first..=last {
            let id = JobId::new(raw)?;
            self.entries.push(template.with_id(id));
            ids.push(id);
        }
        tracing::debug!("Duplicated job {} {} times", source, count);
        self.notify_changed();
        self.set_selection(ids.last().copied());
        Ok(ids)
    }

    pub fn duplicate_selected(&mut self, count: usize) -> Result<Vec<JobId>, DomainError> {
        let source = self.selected.ok_or(DomainError::NoSelection)?;
        self.duplicate(source, count)
    }

    /// Overwrites job `target` with a copy of `draft`, keeping its ID.
    pub fn replace(&mut self, target: JobId, draft: &JobConfiguration) -> Result<(), DomainError> {
        let index = self.position(target)?;
        self.entries[index] = draft.with_id(target);
        self.notify_changed();
        Ok(())
    }

    pub fn replace_selected(&mut self, draft: &JobConfiguration) -> Result<(), DomainError> {
        let target = self.selected.ok_or(DomainError::NoSelection)?;
        self.replace(target, draft)
    }

    /// Removes job `target` and clears the selection.
    pub fn delete(&mut self, target: JobId) -> Result<JobConfiguration, DomainError> {
        let index = self.position(target)?;
        let removed = self.entries.remove(index);
        self.notify_changed();
        self.set_selection(None);
        Ok(removed)
    }

    pub fn delete_selected(&mut self) -> Result<JobConfiguration, DomainError> {
        let target = self.selected.ok_or(DomainError::NoSelection)?;
        self.delete(target)
    }

    pub fn clear(&mut self) {
        if self.entries.is_empty() && self.selected.is_none() {
            return;
        }
        self.entries.clear();
        self.notify_changed();
        self.set_selection(None);
    }

    /// Replaces the whole list with `jobs`, keeping their IDs. Used when a
    /// saved batch is loaded. On error the list is unchanged.
    pub fn restore(&mut self, jobs: Vec<JobConfiguration>) -> Result<(), DomainError> {
        if jobs.len() > self.max_count {
            return Err(DomainError::CapacityReached {
                count: jobs.len(),
                max: self.max_count,
            });
        }
        if !jobs.is_empty() {
            validate_batch(&jobs)?;
        }
        self.entries = jobs;
        tracing::debug!("Restored {} job(s)", self.entries.len());
        self.notify_changed();
        self.set_selection(None);
        Ok(())
    }

    pub fn select(&mut self, id: Option<JobId>) -> Result<(), DomainError> {
        if let Some(id) = id {
            self.position(id)?;
        }
        self.set_selection(id);
        Ok(())
    }

    fn set_selection(&mut self, id: Option<JobId>) {
        if self.selected == id {
            return;
        }
        self.selected = id;
        self.observers.notify(&JobListEvent::SelectionChanged(id));
    }

    fn notify_changed(&mut self) {
        let event = JobListEvent::Changed {
            has_valid_jobs: self.has_valid_jobs(),
        };
        self.observers.notify(&event);
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&JobListEvent) + 'static) -> SubscriptionId {
        self.observers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }
}

/// Checks that a batch is non-empty and its IDs are pairwise distinct.
pub fn validate_batch(jobs: &[JobConfiguration]) -> Result<(), DomainError> {
    if jobs.is_empty() {
        return Err(DomainError::EmptyBatch);
    }
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    for job in jobs {
        if !seen.insert(job.id()) {
            duplicates.insert(job.id());
        }
    }
    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(DomainError::DuplicateJobIds(duplicates.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn id(raw: u32) -> JobId {
        JobId::new(raw).unwrap()
    }

    #[test]
    fn test_add_assigns_sequential_ids() {
        let mut list = JobList::default();
        let draft = JobConfiguration::draft();
        assert_eq!(list.add(&draft).unwrap(), id(1));
        assert_eq!(list.add(&draft).unwrap(), id(2));
        assert_eq!(list.selected_id(), Some(id(2)));
    }

    #[test]
    fn test_duplicate_appends_copies() {
        let mut list = JobList::default();
        let mut draft = JobConfiguration::draft();
        draft.set_lattice_size(33).unwrap();
        list.add(&draft).unwrap();

        let ids = list.duplicate(id(1), 3).unwrap();
        assert_eq!(ids, vec![id(2), id(3), id(4)]);
        assert_eq!(list.ids(), vec![id(1), id(2), id(3), id(4)]);
        assert_eq!(list.selected_id(), Some(id(4)));
        assert!(list.iter().all(|job| job.lattice_size() == 33));
    }

    #[test]
    fn test_ids_continue_after_delete() {
        let mut list = JobList::default();
        let draft = JobConfiguration::draft();
        list.add(&draft).unwrap();
        list.add(&draft).unwrap();
        list.delete(id(1)).unwrap();
        assert_eq!(list.selected_id(), None);
        assert_eq!(list.add(&draft).unwrap(), id(3));
    }

    #[test]
    fn test_capacity_limits() {
        let mut list = JobList::new(3);
        let draft = JobConfiguration::draft();
        list.add(&draft).unwrap();
        list.add(&draft).unwrap();

        let err = list.duplicate(id(1), 1).unwrap_err();
        assert!(matches!(err, DomainError::CapacityReached { count: 2, max: 3 }));
        assert_eq!(list.len(), 2);

        list.add(&draft).unwrap();
        assert!(matches!(
            list.add(&draft),
            Err(DomainError::CapacityReached { .. })
        ));
    }

    #[test]
    fn test_replace_keeps_id() {
        let mut list = JobList::default();
        list.add(&JobConfiguration::draft()).unwrap();
        let mut edited = JobConfiguration::draft();
        edited.set_temperature(500.0).unwrap();
        edited.set_id(42).unwrap();

        list.replace_selected(&edited).unwrap();
        let job = list.get(id(1)).unwrap();
        assert_eq!(job.temperature(), 500.0);
        assert_eq!(job.id(), id(1));
    }

    #[test]
    fn test_selection_required() {
        let mut list = JobList::default();
        assert_eq!(list.delete_selected(), Err(DomainError::NoSelection));
        assert_eq!(list.duplicate_selected(2), Err(DomainError::NoSelection));
        assert_eq!(
            list.select(Some(id(9))),
            Err(DomainError::JobNotFound(id(9)))
        );
    }

    #[test]
    fn test_events_follow_mutations() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut list = JobList::default();
        let sink = events.clone();
        let sub = list.subscribe(move |e| sink.borrow_mut().push(*e));

        list.add(&JobConfiguration::draft()).unwrap();
        list.clear();

        assert_eq!(
            *events.borrow(),
            vec![
                JobListEvent::Changed {
                    has_valid_jobs: true
                },
                JobListEvent::SelectionChanged(Some(id(1))),
                JobListEvent::Changed {
                    has_valid_jobs: false
                },
                JobListEvent::SelectionChanged(None),
            ]
        );

        assert!(list.unsubscribe(sub));
        list.add(&JobConfiguration::draft()).unwrap();
        assert_eq!(events.borrow().len(), 4);
    }

    #[test]
    fn test_validate_batch() {
        assert_eq!(validate_batch(&[]), Err(DomainError::EmptyBatch));

        let a = JobConfiguration::draft();
        let b = a.with_id(id(2));
        assert!(validate_batch(&[a.clone(), b]).is_ok());
        assert_eq!(
            validate_batch(&[a.clone(), a]),
            Err(DomainError::DuplicateJobIds(vec![id(1)]))
        );
    }

    #[test]
    fn test_restore_keeps_ids_and_next_add_follows_max() {
        let mut list = JobList::new(10);
        list.add(&JobConfiguration::draft()).unwrap();
        let draft = JobConfiguration::draft();
        list.restore(vec![draft.with_id(id(7)), draft.with_id(id(3))])
            .unwrap();
        assert_eq!(list.ids(), vec![id(7), id(3)]);
        assert_eq!(list.selected_id(), None);
        assert_eq!(list.add(&draft).unwrap(), id(8));
    }

    #[test]
    fn test_restore_rejects_duplicates_and_overflow() {
        let mut list = JobList::new(2);
        list.add(&JobConfiguration::draft()).unwrap();
        let draft = JobConfiguration::draft();

        let err = list
            .restore(vec![draft.with_id(id(3)), draft.with_id(id(3))])
            .unwrap_err();
        assert_eq!(err, DomainError::DuplicateJobIds(vec![id(3)]));

        let err = list
            .restore(vec![draft.with_id(id(1)), draft.with_id(id(2)), draft.with_id(id(4))])
            .unwrap_err();
        assert!(matches!(err, DomainError::CapacityReached { count: 3, max: 2 }));
        assert_eq!(list.ids(), vec![id(1)]);
    }
}
