use kidtimer_core::TimerPreset;
use serde::Serialize;

#[derive(Serialize)]
struct PresetRow {
    preset: TimerPreset,
    name: &'static str,
    minutes: u64,
    min_age: u8,
    max_age: u8,
}

pub fn run(age: Option<u8>) -> Result<(), Box<dyn std::error::Error>> {
    let presets = match age {
        Some(age) => TimerPreset::for_age(age),
        None => TimerPreset::ALL.to_vec(),
    };
    let rows: Vec<PresetRow> = presets
        .into_iter()
        .map(|preset| {
            let ages = preset.recommended_ages();
            PresetRow {
                preset,
                name: preset.display_name(),
                minutes: preset.minutes(),
                min_age: *ages.start(),
                max_age: *ages.end(),
            }
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
