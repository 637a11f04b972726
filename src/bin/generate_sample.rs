//! Writes a random IDB-MDS data set so the dashboards can run without the
//! real data. Usage: `generate_sample [output_dir]` (default `data`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const N_RECORDS: usize = 5000;
const YEARS: std::ops::RangeInclusive<i64> = 2018..=2022;

const COUNTRIES: &[&str] = &["Austria", "Denmark", "Germany", "Latvia", "Malta", "Netherlands", "Sweden"];
const SEXES: &[&str] = &["Female", "Male", "Unknown"];
const AGES: &[&str] = &["0-4", "5-14", "15-24", "25-44", "45-64", "65-79", "80+"];
const TREATMENT: &[&str] = &["Treated and sent home", "Admitted to hospital", "Transferred", "Died"];
const INJURY_TYPES: &[&str] = &["Contusion", "Open wound", "Fracture", "Dislocation", "Concussion", "Burn"];
const BODY_PARTS: &[&str] = &["Head", "Face", "Neck", "Trunk", "Upper extremity", "Lower extremity"];
const INTENT: &[&str] = &["Unintentional", "Assault", "Self-harm"];
const PLACES: &[&str] = &["Home", "Road", "School", "Sports area", "Workplace", "Other"];
const MECHANISMS: &[&str] = &["Fall", "Blunt force", "Piercing force", "Thermal", "Poisoning", "Other"];
const ACTIVITIES: &[&str] = &["Leisure", "Sports", "Paid work", "Household", "Education", "Other"];

/// One injury type flag per record: (column, share of records).
const FLAGS: &[(&str, f64)] = &[
    ("HomeLeisure", 0.45),
    ("RoadTraffic", 0.15),
    ("Fall", 0.30),
    ("Sports", 0.12),
    ("PaidWork", 0.08),
    ("SelfHarm", 0.03),
    ("Assault", 0.05),
];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_u64() % items.len() as u64) as usize]
    }

    fn range(&mut self, lo: i64, hi: i64) -> i64 {
        lo + (self.next_u64() % (hi - lo + 1) as u64) as i64
    }
}

/// Column-oriented record buffer; every column holds text except the
/// integer year and flag columns.
struct Records {
    text: Vec<(&'static str, Vec<String>)>,
    year: Vec<i64>,
    flags: Vec<Vec<i64>>,
}

const YEAR_COLUMN: &str = "YearOfAttendance";

fn generate(rng: &mut SimpleRng, n: usize) -> Records {
    let pools: &[(&'static str, &[&str])] = &[
        ("RecordingCountry", COUNTRIES),
        ("AgeCategoryOfPatient", AGES),
        ("SexOfPatient", SEXES),
        ("CountryOfPermanentResidence", COUNTRIES),
        ("TreatmentAndFollowUp", TREATMENT),
        ("TypeOfInjury1", INJURY_TYPES),
        ("TypeOfInjury2", INJURY_TYPES),
        ("PartOfTheBodyInjured1", BODY_PARTS),
        ("PartOfTheBodyInjured2", BODY_PARTS),
        ("Intent", INTENT),
        ("PlaceOfOccurrence", PLACES),
        ("MechanismOfInjury", MECHANISMS),
        ("ActivityWhenInjured", ACTIVITIES),
    ];

    let mut text: Vec<(&'static str, Vec<String>)> =
        pools.iter().map(|(name, _)| (*name, Vec::with_capacity(n))).collect();
    text.push(("MonthOfAttendance", Vec::with_capacity(n)));
    let mut year = Vec::with_capacity(n);
    let mut flags = vec![Vec::with_capacity(n); FLAGS.len()];

    for _ in 0..n {
        for ((_, pool), (_, column)) in pools.iter().zip(text.iter_mut()) {
            column.push(rng.pick(pool).to_string());
        }
        if let Some((_, months)) = text.last_mut() {
            months.push(rng.range(1, 12).to_string());
        }
        year.push(rng.range(*YEARS.start(), *YEARS.end()));
        for ((_, share), column) in FLAGS.iter().zip(flags.iter_mut()) {
            column.push(i64::from(rng.next_f64() < *share));
        }
    }

    Records { text, year, flags }
}

impl Records {
    fn headers(&self) -> Vec<&str> {
        let mut headers: Vec<&str> = self.text.iter().map(|(name, _)| *name).collect();
        headers.push(YEAR_COLUMN);
        headers.extend(FLAGS.iter().map(|(name, _)| *name));
        headers
    }

    fn row(&self, i: usize) -> Vec<String> {
        let mut row: Vec<String> = self.text.iter().map(|(_, col)| col[i].clone()).collect();
        row.push(self.year[i].to_string());
        row.extend(self.flags.iter().map(|col| col[i].to_string()));
        row
    }

    fn len(&self) -> usize {
        self.year.len()
    }
}

fn write_mds_csv(path: &Path, records: &Records, keep: impl Fn(usize) -> bool) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(records.headers())?;
    let mut written = 0;
    for i in (0..records.len()).filter(|&i| keep(i)) {
        writer.write_record(records.row(i))?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

fn write_summary_csv(path: &Path, records: &Records) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    let mut header = vec![YEAR_COLUMN];
    header.extend(FLAGS.iter().map(|(name, _)| *name));
    writer.write_record(&header)?;
    for i in 0..records.len() {
        let mut row = vec![records.year[i].to_string()];
        row.extend(records.flags.iter().map(|col| col[i].to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_mds_parquet(path: &Path, records: &Records) -> Result<()> {
    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();
    for (name, column) in &records.text {
        fields.push(Field::new(*name, DataType::Utf8, false));
        arrays.push(Arc::new(StringArray::from(column.clone())));
    }
    fields.push(Field::new(YEAR_COLUMN, DataType::Int64, false));
    arrays.push(Arc::new(Int64Array::from(records.year.clone())));
    for ((name, _), column) in FLAGS.iter().zip(&records.flags) {
        fields.push(Field::new(*name, DataType::Int64, false));
        arrays.push(Arc::new(Int64Array::from(column.clone())));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn write_reference_population(path: &Path, rng: &mut SimpleRng) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record([YEAR_COLUMN, "ReferencePopulation"])?;
    for year in YEARS {
        let population = 140_000_000 + rng.range(-2_000_000, 2_000_000);
        writer.write_record([year.to_string(), population.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = std::env::args().nth(1).map_or_else(|| PathBuf::from("data"), PathBuf::from);
    std::fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let mut rng = SimpleRng::new(42);
    let records = generate(&mut rng, N_RECORDS);

    let n = write_mds_csv(&out_dir.join("mds dashboard.csv"), &records, |_| true)?;
    log::info!("Wrote {n} records to mds dashboard.csv");

    // Stable countries: a fixed subset reporting every year.
    let stable = ["Austria", "Germany", "Netherlands", "Sweden"];
    let countries = &records.text[0].1;
    let n = write_mds_csv(
        &out_dir.join("MDS 2018-2022 stable countries.csv"),
        &records,
        |i| stable.contains(&countries[i].as_str()),
    )?;
    log::info!("Wrote {n} records to MDS 2018-2022 stable countries.csv");

    write_summary_csv(&out_dir.join("mds dashboard random.csv"), &records)?;
    write_mds_parquet(&out_dir.join("mds dashboard.parquet"), &records)?;
    write_reference_population(&out_dir.join("reference population.csv"), &mut rng)?;

    println!("Wrote sample data ({} records) to {}", records.len(), out_dir.display());
    Ok(())
}
