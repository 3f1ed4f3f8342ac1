//! Steady-state frame processing must not touch the heap.
//!
//! A counting global allocator wraps `System`. Counting is switched on per
//! thread so tests running in parallel do not see each other.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::f32::consts::PI;

use ndarray::{Array2, Array3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use radarcore::algo::{OsCfar, OsCfarConfig, PpfftConfig};
use radarcore::apps::presence::presence_device_config;
use radarcore::apps::{
    MotionAngle, MotionAngleConfig, PresenceConfig, PresenceSensing, Segmentation, SegmentationConfig,
};
use radarcore::device::{DeviceConfig, Scene, Sensor, SensorType, SyntheticSensor, Target};
use radarcore::math::window::{WindowConfig, WindowType};
use radarcore::math::FftType;
use radarcore::radar::{AngleCapon, AngleCaponConfig, RangeDopplerMap, RangeDopplerMapConfig, ScaleType};
use radarcore::{Complex, Float, FrameProcessor};

struct CountingAllocator;

thread_local! {
    static COUNTING: Cell<bool> = const { Cell::new(false) };
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
}

fn note_allocation() {
    if COUNTING.try_with(Cell::get).unwrap_or(false) {
        let _ = ALLOCATIONS.try_with(|count| count.set(count.get() + 1));
    }
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        note_allocation();
        System.alloc(layout)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        note_allocation();
        System.alloc_zeroed(layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        note_allocation();
        System.realloc(ptr, layout, new_size)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static GLOBAL: CountingAllocator = CountingAllocator;

/// Runs `f` and returns its result with the number of heap allocations it made.
fn allocations_during<R>(f: impl FnOnce() -> R) -> (R, usize) {
    ALLOCATIONS.with(|count| count.set(0));
    COUNTING.with(|flag| flag.set(true));
    let result = f();
    COUNTING.with(|flag| flag.set(false));
    (result, ALLOCATIONS.with(Cell::get))
}

fn start_sensor(device: &DeviceConfig, scene: Scene) -> SyntheticSensor {
    let mut sensor = SyntheticSensor::new(SensorType::Bgt60tr13c, scene).unwrap();
    sensor.set_config(device).unwrap();
    sensor.start_acquisition().unwrap();
    sensor
}

fn record(sensor: &mut SyntheticSensor, device: &DeviceConfig, count: usize) -> Vec<Array3<Float>> {
    (0..count)
        .map(|_| {
            let mut frame = Array3::zeros(device.frame_shape());
            sensor.get_next_frame(frame.view_mut(), 100).unwrap();
            frame
        })
        .collect()
}

fn walker(range_m: Float, speed_m_s: Float) -> Target {
    Target {
        range_m,
        speed_m_s,
        azimuth_deg: 10.0,
        elevation_deg: 0.0,
        amplitude: 1.0,
    }
}

#[test]
fn range_doppler_map_run_does_not_allocate() {
    let mut rdm = RangeDopplerMap::new(&RangeDopplerMapConfig {
        spect_threshold: 1e-6,
        output_scale: ScaleType::Db20,
        range_fft: PpfftConfig::new(FftType::R2C, 128, WindowConfig::new(WindowType::BlackmanHarris, 64)),
        doppler_fft: PpfftConfig::new(FftType::C2C, 64, WindowConfig::chebyshev(32, 100.0)),
    })
    .unwrap();
    let input = Array2::from_shape_fn((32, 64), |(n, k)| {
        (2.0 * PI * 0.1 * n as Float + 2.0 * PI * 0.2 * k as Float).cos()
    });
    let mut output = Array2::zeros((64, 64));
    rdm.run(input.view(), output.view_mut()).unwrap();

    let (result, allocations) = allocations_during(|| rdm.run(input.view(), output.view_mut()));
    result.unwrap();
    assert_eq!(allocations, 0);
}

#[test]
fn os_cfar_run_does_not_allocate() {
    let mut rng = StdRng::seed_from_u64(17);
    let normal = Normal::new(0.0, 1.0).unwrap();
    let mut input = Array2::from_shape_fn((64, 64), |_| {
        let x = Complex::new(normal.sample(&mut rng), normal.sample(&mut rng));
        x.norm_sqr()
    });
    input[[30, 30]] = 500.0;
    let mut cfar = OsCfar::new(OsCfarConfig::default()).unwrap();
    let mut output = Array2::zeros((64, 64));
    cfar.run(input.view(), output.view_mut()).unwrap();

    let (detections, allocations) = allocations_during(|| cfar.run(input.view(), output.view_mut()));
    assert!(detections.unwrap() >= 1);
    assert_eq!(allocations, 0);
}

#[test]
fn capon_run_does_not_allocate() {
    let mut capon = AngleCapon::new(AngleCaponConfig {
        range_win_size: 5,
        selected_rx: 0,
        chirps_per_frame: 16,
        phase_offset_degrees: 0.0,
        num_virtual_antennas: 2,
        num_beams: 121,
        min_angle_degrees: -60.0,
        max_angle_degrees: 60.0,
        d_by_lambda: 0.5,
    })
    .unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let noise = Normal::new(0.0, 0.05).unwrap();
    let mut cube = Array3::from_shape_fn((8, 16, 2), |_| Complex::new(noise.sample(&mut rng), noise.sample(&mut rng)));
    for d in 4..9 {
        for n in 0..2 {
            let phase = -PI * n as Float * (20.0 as Float).to_radians().sin() + 0.3 * d as Float;
            cube[[3, d, n]] += Complex::from_polar(if d == 6 { 10.0 } else { 3.0 }, phase);
        }
    }
    capon.run(3, cube.view()).unwrap();

    let (angle, allocations) = allocations_during(|| capon.run(3, cube.view()));
    assert!((angle.unwrap() - 20.0).abs() <= 3.0);
    assert_eq!(allocations, 0);
}

#[test]
fn presence_process_does_not_allocate() {
    let device = presence_device_config();
    let mut presence = PresenceSensing::new(
        PresenceConfig {
            min_range_m: 0.5,
            max_range_m: 3.0,
            sensitivity: 0.5,
        },
        &device,
    )
    .unwrap();
    let mut sensor = start_sensor(
        &device,
        Scene {
            seed: 3,
            noise_std: 0.01,
            ..Scene::default()
        },
    );
    let quiet = record(&mut sensor, &device, 20);
    sensor.targets_mut().push(walker(1.5, 0.2));
    let busy = record(&mut sensor, &device, 8);
    for frame in &quiet {
        presence.process(frame.view()).unwrap();
    }

    // includes the Absence to Presence transition
    let (results, allocations) = allocations_during(|| {
        let mut present = false;
        for frame in &busy {
            present = presence.process(frame.view())?.target_state;
        }
        Ok::<_, radarcore::RadarError>(present)
    });
    assert!(results.unwrap());
    assert_eq!(allocations, 0);
}

#[test]
fn motion_angle_process_does_not_allocate() {
    let mut tracker = MotionAngle::new(MotionAngleConfig::default()).unwrap();
    let device = *tracker.device_config();
    let mut sensor = start_sensor(
        &device,
        Scene {
            targets: vec![walker(1.5, 1.0)],
            seed: 5,
            ..Scene::default()
        },
    );
    let frames = record(&mut sensor, &device, 10);
    for frame in &frames[..3] {
        tracker.process(frame.view()).unwrap();
    }

    let (last, allocations) = allocations_during(|| {
        let mut last = None;
        for frame in &frames[3..] {
            last = Some(tracker.process(frame.view()));
        }
        last
    });
    assert!(last.unwrap().unwrap().is_present());
    assert_eq!(allocations, 0);
}

#[test]
fn segmentation_process_does_not_allocate() {
    let mut segmentation = Segmentation::new(SegmentationConfig::default()).unwrap();
    let device = *segmentation.device_config();
    let mut sensor = start_sensor(
        &device,
        Scene {
            targets: vec![Target {
                azimuth_deg: 0.0,
                ..walker(2.0, 0.5)
            }],
            seed: 11,
            ..Scene::default()
        },
    );
    let frames = record(&mut sensor, &device, 10);
    for frame in &frames[..3] {
        segmentation.process(frame.view()).unwrap();
    }

    let (last, allocations) = allocations_during(|| {
        let mut last = None;
        for frame in &frames[3..] {
            last = Some(segmentation.process(frame.view()));
        }
        last
    });
    let last = last.unwrap().unwrap();
    assert!(last.tracks.iter().any(|track| track.is_valid()));
    assert!(segmentation.num_tracks() > 0);
    assert_eq!(allocations, 0);
}
