//! Wards and patients.

/// A hospital ward.
///
/// Per-day vectors may be left empty, in which case they are read as zero
/// for every day of the horizon.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ward {
    /// External identifier.
    pub id: String,
    /// Number of beds.
    pub capacity: u32,
    /// Specializations this ward admits.
    pub specializations: Vec<u32>,
    /// Operating-block minutes available per day.
    pub operating_time: Vec<u32>,
    /// Beds occupied per day by patients admitted before the horizon.
    pub carryover: Vec<u32>,
}

impl Ward {
    pub fn new(id: impl Into<String>, capacity: u32) -> Self {
        Self {
            id: id.into(),
            capacity,
            specializations: Vec::new(),
            operating_time: Vec::new(),
            carryover: Vec::new(),
        }
    }

    pub fn with_specializations(mut self, specializations: impl IntoIterator<Item = u32>) -> Self {
        self.specializations = specializations.into_iter().collect();
        self
    }

    pub fn with_operating_time(mut self, minutes_per_day: impl IntoIterator<Item = u32>) -> Self {
        self.operating_time = minutes_per_day.into_iter().collect();
        self
    }

    pub fn with_carryover(mut self, beds_per_day: impl IntoIterator<Item = u32>) -> Self {
        self.carryover = beds_per_day.into_iter().collect();
        self
    }

    /// Whether this ward admits the given specialization.
    #[inline]
    pub fn supports(&self, specialization: u32) -> bool {
        self.specializations.contains(&specialization)
    }
}

/// A patient awaiting admission.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Patient {
    /// External identifier.
    pub id: String,
    /// Required specialization.
    pub specialization: u32,
    /// First admissible day (inclusive).
    pub earliest: usize,
    /// Last admissible day (inclusive).
    pub latest: usize,
    /// Nights spent in the ward, starting on the admission day.
    pub length_of_stay: usize,
    /// Operating minutes consumed on the admission day.
    pub operating_time: u32,
}

impl Patient {
    pub fn new(id: impl Into<String>, specialization: u32) -> Self {
        Self {
            id: id.into(),
            specialization,
            earliest: 0,
            latest: 0,
            length_of_stay: 1,
            operating_time: 0,
        }
    }

    pub fn with_window(mut self, earliest: usize, latest: usize) -> Self {
        self.earliest = earliest;
        self.latest = latest;
        self
    }

    pub fn with_length_of_stay(mut self, days: usize) -> Self {
        self.length_of_stay = days;
        self
    }

    pub fn with_operating_time(mut self, minutes: u32) -> Self {
        self.operating_time = minutes;
        self
    }
}
