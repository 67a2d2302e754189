//! Landmark index maps
//!
//! Indices into the MediaPipe face mesh (468 points), pose (33 points) and
//! hand (21 points) topologies consumed by the detectors.

/// Face mesh indices
pub mod face {
    /// Minimum number of points in a usable face mesh
    pub const POINT_COUNT: usize = 468;

    /// Right eye (image left), ordered for the eye aspect ratio:
    /// outer, top outer, top inner, inner, bottom inner, bottom outer
    pub const RIGHT_EYE: [usize; 6] = [33, 160, 158, 133, 153, 144];
    /// Left eye (image right), same ordering
    pub const LEFT_EYE: [usize; 6] = [263, 387, 385, 362, 380, 373];

    /// Inner lip contour ordered for the mouth aspect ratio:
    /// left corner, top left, top center, top right, right corner,
    /// bottom right, bottom center, bottom left
    pub const MOUTH: [usize; 8] = [78, 81, 13, 311, 308, 402, 14, 178];

    pub const NOSE_TIP: usize = 1;
    pub const CHIN: usize = 152;
    pub const RIGHT_EYE_OUTER: usize = 33;
    pub const LEFT_EYE_OUTER: usize = 263;
    pub const MOUTH_RIGHT: usize = 61;
    pub const MOUTH_LEFT: usize = 291;
    pub const UPPER_LIP: usize = 13;
    pub const LOWER_LIP: usize = 14;
    pub const FOREHEAD: usize = 10;
    pub const RIGHT_CHEEK: usize = 234;
    pub const LEFT_CHEEK: usize = 454;

    /// Points solved against the head model, in model order
    pub const POSE_POINTS: [usize; 6] = [
        NOSE_TIP,
        CHIN,
        RIGHT_EYE_OUTER,
        LEFT_EYE_OUTER,
        MOUTH_RIGHT,
        MOUTH_LEFT,
    ];

    /// Region a fingertip can touch
    pub const TOUCH_REGION: [usize; 8] = [
        NOSE_TIP,
        CHIN,
        RIGHT_CHEEK,
        LEFT_CHEEK,
        UPPER_LIP,
        FOREHEAD,
        RIGHT_EYE_OUTER,
        LEFT_EYE_OUTER,
    ];

    /// Top-of-head contour
    pub const HEAD_TOP: [usize; 3] = [FOREHEAD, 109, 338];
}

/// Body pose indices
pub mod pose {
    pub const POINT_COUNT: usize = 33;

    pub const NOSE: usize = 0;
    pub const LEFT_EAR: usize = 7;
    pub const RIGHT_EAR: usize = 8;
    pub const LEFT_SHOULDER: usize = 11;
    pub const RIGHT_SHOULDER: usize = 12;
    pub const LEFT_HIP: usize = 23;
    pub const RIGHT_HIP: usize = 24;
}

/// Hand indices
pub mod hand {
    pub const POINT_COUNT: usize = 21;

    pub const WRIST: usize = 0;
    pub const FINGERTIPS: [usize; 5] = [4, 8, 12, 16, 20];
}
