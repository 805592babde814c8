/// Equal-tempered reference frequencies for one octave, starting at A4.
pub const CHROMATIC_SCALE: [f32; 12] = [
    440.0, 466.16, 493.88, 523.25, 554.37, 587.33, 622.25, 659.26, 698.46, 739.99, 783.99, 830.61,
];

pub const NOTE_NAMES: [&str; 12] = ["A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#"];

pub const PITCH_CLASSES: usize = CHROMATIC_SCALE.len();

/// Octave of A4 in scientific pitch notation.
const REFERENCE_OCTAVE: i32 = 4;

/// One of the 12 chromatic steps, A = 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PitchClass(u8);

impl PitchClass {
    #[allow(dead_code)]
    pub fn new(index: usize) -> Option<Self> {
        (index < PITCH_CLASSES).then_some(Self(index as u8))
    }

    /// Pitch class of a ScaleEntry index (entries are octave-major).
    pub fn of_entry(entry: usize) -> Self {
        Self((entry % PITCH_CLASSES) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn name(self) -> &'static str {
        NOTE_NAMES[self.index()]
    }

    /// Reference frequency in the A4 octave.
    pub fn base_frequency(self) -> f32 {
        CHROMATIC_SCALE[self.index()]
    }

    /// Frequency shifted by `octave` octaves from the reference octave.
    pub fn frequency(self, octave: i32) -> f32 {
        self.base_frequency() * 2f32.powi(octave)
    }
}

/// A (pitch class, octave offset) pair. Offset 0 is the A4 octave.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaleEntry {
    pub pitch: PitchClass,
    pub octave: i32,
}

impl ScaleEntry {
    pub fn frequency(&self) -> f32 {
        self.pitch.frequency(self.octave)
    }

    /// Label like `C#5`. The scale starts at A, so C..G# belong to the
    /// next scientific octave.
    pub fn label(&self) -> String {
        let carry = if self.pitch.index() >= 3 { 1 } else { 0 };
        format!(
            "{}{}",
            self.pitch.name(),
            REFERENCE_OCTAVE + self.octave + carry
        )
    }
}
