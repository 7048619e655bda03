use std::io::Write;

use blobfs::{Error, Partition, LINE_BUFFER_SIZE};
use log::debug;

const DEFAULT_IMAGE: &str = "/tmp/blobfs.img";
const DUMP_WIDTH: usize = 32;

fn prompt(separator: &str) -> Option<Vec<String>> {
    let mut line = String::new();
    print!("{separator}");
    std::io::stdout().flush().ok()?;
    match std::io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.split_whitespace().map(str::to_string).collect()),
    }
}

fn load() -> Result<Partition, Error> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_IMAGE.to_owned());
    let mut image = std::fs::File::options().read(true).open(&path)?;
    debug!("Reading image {path}");
    Partition::read_from(&mut image)
}

fn dump_block(partition: &Partition, index: u32) -> Result<(), Error> {
    if index >= partition.header().block_count {
        return Err(Error::OutOfBounds);
    }
    let used = partition.block_bitmap().get(index)?;
    println!["Block {index} ({})", if used { "used" } else { "free" }];
    for (row, bytes) in partition.block(index).chunks(DUMP_WIDTH).enumerate() {
        let hex = bytes
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!["{:>6x}: {hex}", row * DUMP_WIDTH];
    }
    Ok(())
}

fn cat(partition: &mut Partition, index: u32) -> Result<(), Error> {
    let mut file = partition.open(index)?;
    let mut buffer = [0u8; LINE_BUFFER_SIZE];
    let mut stdout = std::io::stdout();
    loop {
        let length = file.read(&mut buffer)?;
        if length == 0 {
            break;
        }
        stdout.write_all(&buffer[..length])?;
    }
    println![];
    Ok(())
}

fn execute(cmd: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    if cmd.is_empty() {
        return Ok(());
    }
    let mut partition = load()?;
    match (cmd[0].as_str(), cmd.get(1)) {
        ("s", _) => println!["{}", partition.header()],
        ("b", Some(index)) => dump_block(&partition, index.parse()?)?,
        ("b", None) => println!["{}", partition.block_bitmap()],
        ("i", Some(index)) => println!["{}", partition.load_inode(index.parse()?)?],
        ("i", None) => println!["{}", partition.inode_bitmap()],
        ("l", index) => {
            let directory = match index {
                Some(index) => index.parse()?,
                None => partition.root(),
            };
            for entry in partition.list(directory)? {
                println!["{:>8} {:<12} {}", entry.inode, format!("{:?}", entry.kind), entry.name];
            }
        }
        ("c", Some(index)) => cat(&mut partition, index.parse()?)?,
        _ => eprintln!["Commands: s, b [block], i [inode], l [directory], c <inode>"],
    }
    Ok(())
}

fn main() {
    env_logger::init();
    while let Some(cmd) = prompt(">> ") {
        if let Err(e) = execute(&cmd) {
            eprintln!("{e}");
        }
    }
}
