//! Basic usage example for the SchemaPack buffer runtime

use schemapack::{BufferBuilder, BufferReader};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("SchemaPack Buffer Example");
    println!("=========================");

    // Size is known up front, so use the exact-size fast path
    let name = "Hello, SchemaPack!";
    let size = 4 + 8 + 1 + BufferBuilder::string_size(name) + 1;
    let mut builder = BufferBuilder::exact(size);

    builder.write_u32(12345);
    builder.write_f64(3.14159);
    builder.write_bool(true);
    builder.write_string(name)?;
    builder.write_bits(&[true, false, true, false])?;

    let data = builder.finish();
    println!("✅ Serialized: {} bytes (expected {})", data.len(), size);
    println!("   Bytes: {:?}", &data[..data.len().min(16)]);

    let mut reader = BufferReader::new(&data);
    println!("\n📖 Reading back:");
    println!("   ID: {}", reader.read_u32()?);
    println!("   PI: {:.5}", reader.read_f64()?);
    println!("   Flag: {}", reader.read_bool()?);
    println!("   Name: {}", reader.read_string()?);
    println!("   Bits: {:?}", reader.read_bits()?);
    reader.assert_fully_consumed()?;

    println!("\n🎉 Buffer fully consumed");
    Ok(())
}
