/// A compressor station.
///
/// Workshop counts are deliberately unconstrained: `working_workshops` may
/// exceed `total_workshops`, matching the record-keeping conventions of the
/// upstream data. The identifier is allocated by the
/// [`Registry`](crate::Registry) and shares one sequence with pipe ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    id: u64,
    name: String,
    total_workshops: i32,
    working_workshops: i32,
    classification: String,
}

impl Station {
    /// Construct a station around an already-allocated identifier.
    #[must_use]
    pub fn new(
        id: u64,
        name: impl Into<String>,
        total_workshops: i32,
        working_workshops: i32,
        classification: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            total_workshops,
            working_workshops,
            classification: classification.into(),
        }
    }

    /// The registry-wide unique identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total number of workshops at the station.
    #[must_use]
    pub const fn total_workshops(&self) -> i32 {
        self.total_workshops
    }

    /// Number of workshops currently operating.
    #[must_use]
    pub const fn working_workshops(&self) -> i32 {
        self.working_workshops
    }

    /// Free-form classification label.
    #[must_use]
    pub fn classification(&self) -> &str {
        &self.classification
    }

    /// Replace the display name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Replace the total workshop count.
    pub const fn set_total_workshops(&mut self, total: i32) {
        self.total_workshops = total;
    }

    /// Replace the working workshop count.
    pub const fn set_working_workshops(&mut self, working: i32) {
        self.working_workshops = working;
    }

    /// Replace the classification label.
    pub fn set_classification(&mut self, classification: impl Into<String>) {
        self.classification = classification.into();
    }

    /// Share of workshops standing idle, as a percentage.
    ///
    /// Computed on demand as `100 * (total - working) / total`. A station
    /// with no workshops reports `0.0` regardless of the working count.
    #[must_use]
    pub fn percent_idle(&self) -> f64 {
        if self.total_workshops <= 0 {
            return 0.0;
        }
        let idle = self.total_workshops - self.working_workshops;
        100.0 * f64::from(idle) / f64::from(self.total_workshops)
    }
}

#[cfg(test)]
mod tests {
    use super::Station;

    #[test]
    fn percent_idle_of_partially_working_station() {
        let station = Station::new(1, "CS-North", 10, 8, "A");
        assert!((station.percent_idle() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn percent_idle_with_no_workshops_is_zero() {
        let station = Station::new(1, "CS-Empty", 0, 5, "B");
        assert!(station.percent_idle().abs() < f64::EPSILON);
    }

    #[test]
    fn percent_idle_with_negative_total_is_zero() {
        let station = Station::new(1, "CS-Odd", -4, 0, "B");
        assert!(station.percent_idle().abs() < f64::EPSILON);
    }

    #[test]
    fn percent_idle_of_fully_working_station_is_zero() {
        let station = Station::new(1, "CS-East", 12, 12, "A+");
        assert!(station.percent_idle().abs() < f64::EPSILON);
    }

    #[test]
    fn working_count_above_total_yields_negative_idle() {
        // Not validated; the derived metric just goes negative.
        let station = Station::new(1, "CS-Over", 4, 6, "C");
        assert!((station.percent_idle() + 50.0).abs() < f64::EPSILON);
    }
}
