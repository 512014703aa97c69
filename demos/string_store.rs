use silo::{Config, Result, Store};

fn open_quotes() -> Result<Store<String>> {
    // Strings serialize as their raw UTF-8 bytes. The decode callback may
    // consume everything that is pending, because the store hands it
    // exactly one payload at a time.
    Store::open(
        Config::new("demo-store", "quotes"),
        |value: &String, buf| buf.put_bytes(value.as_bytes()),
        |buf| {
            let len = buf.transferable_data();
            let bytes = buf.get_bytes(len)?.to_vec();
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        },
    )
}

fn main() -> Result<()> {
    let mut quotes = open_quotes()?;

    let hello = quotes.store("Hello world!".to_owned())?;
    quotes.store("Greetings from the store.".to_owned())?;

    assert_eq!(quotes.get(hello.id())?.value(), "Hello world!");

    // Updating keeps the identifier; the payload moves to a new place in
    // the data file.
    quotes.update(hello.id(), "Hello, persistent world!".to_owned())?;
    assert_eq!(quotes.get(hello.id())?.value(), "Hello, persistent world!");

    let long = quotes.query(|_, value| value.len() > 20)?;
    for item in &long {
        println!("{}: {}", item.id(), item.value());
    }

    // Compact the files before closing. The store works fine without this,
    // it just may keep some reclaimable bytes around.
    quotes.organize()?;
    quotes.close()
}
