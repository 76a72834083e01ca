//! Quadrant-table trigonometry.
//!
//! The oscillator and the phase averaging only ever need sine, cosine and
//! a vector-to-phase conversion, all in units of turns (a phase of 1.0 is
//! a full cycle). Both tables cover a single quadrant in 64 steps plus the
//! endpoint; the remaining quadrants fold onto it by symmetry.

/// sin(pi/2 * i/64) for i in 0..=64.
const SINE_QUADRANT: [f32; 65] = [
    0.00000000e+00,
    2.45412285e-02,
    4.90676743e-02,
    7.35645636e-02,
    9.80171403e-02,
    1.22410675e-01,
    1.46730474e-01,
    1.70961889e-01,
    1.95090322e-01,
    2.19101240e-01,
    2.42980180e-01,
    2.66712757e-01,
    2.90284677e-01,
    3.13681740e-01,
    3.36889853e-01,
    3.59895037e-01,
    3.82683432e-01,
    4.05241314e-01,
    4.27555093e-01,
    4.49611330e-01,
    4.71396737e-01,
    4.92898192e-01,
    5.14102744e-01,
    5.34997620e-01,
    5.55570233e-01,
    5.75808191e-01,
    5.95699304e-01,
    6.15231591e-01,
    6.34393284e-01,
    6.53172843e-01,
    6.71558955e-01,
    6.89540545e-01,
    7.07106781e-01,
    7.24247083e-01,
    7.40951125e-01,
    7.57208847e-01,
    7.73010453e-01,
    7.88346428e-01,
    8.03207531e-01,
    8.17584813e-01,
    8.31469612e-01,
    8.44853565e-01,
    8.57728610e-01,
    8.70086991e-01,
    8.81921264e-01,
    8.93224301e-01,
    9.03989293e-01,
    9.14209756e-01,
    9.23879533e-01,
    9.32992799e-01,
    9.41544065e-01,
    9.49528181e-01,
    9.56940336e-01,
    9.63776066e-01,
    9.70031253e-01,
    9.75702130e-01,
    9.80785280e-01,
    9.85277642e-01,
    9.89176510e-01,
    9.92479535e-01,
    9.95184727e-01,
    9.97290457e-01,
    9.98795456e-01,
    9.99698819e-01,
    1.00000000e+00,
];

/// atan(i/64) / 2pi for i in 0..=64.
const ARCTAN_QUADRANT: [f32; 65] = [
    0.00000000e+00,
    2.48659364e-03,
    4.97197391e-03,
    7.45493100e-03,
    9.93426215e-03,
    1.24087752e-02,
    1.48772918e-02,
    1.73386510e-02,
    1.97917121e-02,
    2.22353579e-02,
    2.46684976e-02,
    2.70900693e-02,
    2.94990424e-02,
    3.18944204e-02,
    3.42752424e-02,
    3.66405853e-02,
    3.89895652e-02,
    4.13213389e-02,
    4.36351051e-02,
    4.59301052e-02,
    4.82056240e-02,
    5.04609904e-02,
    5.26955772e-02,
    5.49088019e-02,
    5.71001256e-02,
    5.92690536e-02,
    6.14151343e-02,
    6.35379589e-02,
    6.56371604e-02,
    6.77124128e-02,
    6.97634302e-02,
    7.17899654e-02,
    7.37918088e-02,
    7.57687872e-02,
    7.77207622e-02,
    7.96476291e-02,
    8.15493154e-02,
    8.34257790e-02,
    8.52770071e-02,
    8.71030145e-02,
    8.89038422e-02,
    9.06795559e-02,
    9.24302444e-02,
    9.41560182e-02,
    9.58570083e-02,
    9.75333644e-02,
    9.91852539e-02,
    1.00812860e-01,
    1.02416382e-01,
    1.03996032e-01,
    1.05552035e-01,
    1.07084626e-01,
    1.08594052e-01,
    1.10080570e-01,
    1.11544443e-01,
    1.12985943e-01,
    1.14405348e-01,
    1.15802940e-01,
    1.17179009e-01,
    1.18533847e-01,
    1.19867749e-01,
    1.21181014e-01,
    1.22473943e-01,
    1.23746837e-01,
    1.25000000e-01,
];

/// Fractional part with truncation toward zero.
pub fn fractional_part(x: f32) -> f32 {
    x - libm::truncf(x)
}

/// Wraps a phase into [0, 1), tolerating slightly negative inputs.
pub fn wrap_phase(x: f32) -> f32 {
    let fractional = fractional_part(x);
    if fractional < 0.0 {
        fractional + 1.0
    } else {
        fractional
    }
}

/// sin(2pi * t).
pub fn sine(t: f32) -> f32 {
    let index = (256.0 * wrap_phase(t)) as u32;
    let quadrant = (index >> 6) & 3;
    let mut index = (index & 0x3F) as usize;

    if quadrant & 1 != 0 {
        index = 0x40 - index;
    }

    let value = SINE_QUADRANT[index];
    if quadrant & 2 != 0 {
        -value
    } else {
        value
    }
}

/// cos(2pi * t).
pub fn cosine(t: f32) -> f32 {
    sine(t + 0.25)
}

/// Phase of the vector `(x, y)` in turns, in [0, 1).
pub fn vector_to_phase(x: f32, y: f32) -> f32 {
    let abs_x = libm::fabsf(x);
    let abs_y = libm::fabsf(y);

    if abs_x == 0.0 && abs_y == 0.0 {
        return 0.0;
    }

    let octant = if abs_y <= abs_x {
        arctan(abs_y / abs_x)
    } else {
        0.25 - arctan(abs_x / abs_y)
    };

    let phase = match (x >= 0.0, y >= 0.0) {
        (true, true) => octant,
        (false, true) => 0.5 - octant,
        (false, false) => 0.5 + octant,
        (true, false) => 1.0 - octant,
    };

    wrap_phase(phase)
}

fn arctan(ratio: f32) -> f32 {
    ARCTAN_QUADRANT[(ratio * 64.0 + 0.5) as usize]
}
