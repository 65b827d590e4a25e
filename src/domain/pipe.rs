/// A single pipeline segment.
///
/// The identifier is allocated by the [`Registry`](crate::Registry) when the
/// pipe is added and never changes afterwards. Every other field is mutable
/// through the setters; no validation is applied beyond type conformance.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipe {
    id: u64,
    name: String,
    diameter: f64,
    in_repair: bool,
}

impl Pipe {
    /// Construct a pipe around an already-allocated identifier.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>, diameter: f64, in_repair: bool) -> Self {
        Self {
            id,
            name: name.into(),
            diameter,
            in_repair,
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

    /// The segment diameter.
    ///
    /// Any value is accepted, including zero and negatives; positivity is a
    /// caller convention, enforced only by the batch-edit sentinel rules.
    #[must_use]
    pub const fn diameter(&self) -> f64 {
        self.diameter
    }

    /// Whether the segment is currently under repair.
    #[must_use]
    pub const fn in_repair(&self) -> bool {
        self.in_repair
    }

    /// Replace the display name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Replace the diameter.
    pub const fn set_diameter(&mut self, diameter: f64) {
        self.diameter = diameter;
    }

    /// Set or clear the repair flag.
    pub const fn set_in_repair(&mut self, in_repair: bool) {
        self.in_repair = in_repair;
    }
}
